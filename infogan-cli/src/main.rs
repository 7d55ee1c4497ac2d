//! infogan CLI: trains a regularised GAN through a model worker and exports latent codes.

mod args;

use anyhow::Context;
use args::Cli;
use clap::Parser;
use infogan_core::{
    CodeExporter, Dataset, DirectorySet, ImageFolder, RunConfig, TrainingOrchestrator,
    WorkerModel, load_settings,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), &cli.overrides())
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;
    let config = RunConfig::resolve(settings)?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let dirs = DirectorySet::for_config(&config);
    dirs.create(config.train, config.save_codes)
        .with_context(|| format!("creating experiment directories under {}", dirs.root.display()))?;

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(cli.log_filter()));

    // JSON file layer in the experiment's log directory, only for runs that create it
    let (json_layer, _guard) = match log_file_dir(&config, &dirs) {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "infogan.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    info!(
        experiment = %config.exp_name,
        objective = config.objective.name(),
        arch = %config.arch,
        image_shape = %config.image_shape,
        batch_size = config.batch_size,
        root = %dirs.root.display(),
        "Resolved run configuration"
    );

    if !config.train && !config.save_codes {
        info!("Neither training nor code export requested; nothing to do");
        return Ok(());
    }

    let dataset: Arc<dyn Dataset> = Arc::new(
        ImageFolder::open(&config.data_dir, config.image_shape, &config.file_ext)
            .with_context(|| format!("opening dataset at {}", config.data_dir.display()))?,
    );
    let mut model = WorkerModel::new(&config, &dirs);

    let outcome = run_phases(&config, &dirs, &mut model, dataset).await;
    if let Err(e) = model.shutdown().await {
        error!(error = %e, "Worker shutdown failed");
    }
    outcome
}

/// Where the JSON log file goes. Export-only runs leave the experiment's log dir alone.
fn log_file_dir<'a>(config: &RunConfig, dirs: &'a DirectorySet) -> Option<&'a Path> {
    config.train.then_some(dirs.logs.as_path())
}

async fn run_phases(
    config: &RunConfig,
    dirs: &DirectorySet,
    model: &mut WorkerModel,
    dataset: Arc<dyn Dataset>,
) -> anyhow::Result<()> {
    if config.train {
        let metrics = TrainingOrchestrator::new(config, dirs)
            .run(&mut *model, Arc::clone(&dataset))
            .await
            .context("training failed")?;
        info!(
            iterations = metrics.iterations_completed,
            checkpoints = metrics.checkpoints_written,
            seconds = metrics.total_training_time_secs,
            "Training phase finished"
        );
    }

    if config.save_codes {
        let summary = CodeExporter::new(config, dirs)
            .export(&mut *model, dataset)
            .await
            .context("code export failed")?;
        info!(
            path = %summary.path.display(),
            rows = summary.rows,
            cols = summary.cols,
            "Export phase finished"
        );
    }
    Ok(())
}
