//! Model backed by an external compute process.
//!
//! The worker is spawned on `init_session` and speaks newline-delimited JSON on its
//! stdin/stdout: one [`WorkerRequest`] per line in, one [`WorkerResponse`] per line out.
//! Its stderr is inherited so framework logs stay visible. The training loop, cadence,
//! checkpoint bookkeeping and divergence checks all run on this side.

use super::protocol::{WorkerRequest, WorkerResponse};
use super::{GenerativeModel, ModelSpec};
use crate::config::{RunConfig, WorkerSettings};
use crate::data::{Batch, Generators};
use crate::dirs::DirectorySet;
use crate::distributions::{Distribution, latent_traversal};
use crate::error::{InfoGanError, Result};
use crate::export::CodeMatrix;
use crate::persistence;
use crate::training::{
    CheckpointManager, DivergenceGuard, LossReport, StatsPoint, TrainingMetrics, TrainingSchedule,
};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Live pipes to a spawned worker.
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl WorkerProcess {
    fn spawn(settings: &WorkerSettings) -> Result<Self> {
        let mut child = Command::new(&settings.command)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InfoGanError::worker(format!("failed to spawn '{}': {e}", settings.command))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InfoGanError::worker("failed to capture worker stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InfoGanError::worker("failed to capture worker stdout"))?;
        Ok(Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        })
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<WorkerResponse> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(InfoGanError::worker("worker closed its output"));
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return serde_json::from_str(trimmed).map_err(|e| {
                    InfoGanError::worker(format!("malformed worker response '{trimmed}': {e}"))
                });
            }
        }
    }
}

/// What to render at stats points.
#[derive(Debug, Clone)]
struct Visuals {
    disentangle: bool,
    reconstruct: bool,
    n_disentangle_samples: usize,
    noise_variables: usize,
    latent_codes: usize,
}

pub struct WorkerModel {
    settings: WorkerSettings,
    spec: ModelSpec,
    dirs: DirectorySet,
    visuals: Visuals,
    checkpoints: CheckpointManager,
    spike_factor: Option<f64>,
    timeout: Duration,
    process: Option<WorkerProcess>,
}

impl WorkerModel {
    pub fn new(config: &RunConfig, dirs: &DirectorySet) -> Self {
        Self {
            settings: config.worker.clone(),
            spec: ModelSpec::from_config(config),
            dirs: dirs.clone(),
            visuals: Visuals {
                disentangle: config.visualize_disentangle,
                reconstruct: config.visualize_reconstruct,
                n_disentangle_samples: config.n_disentangle_samples,
                noise_variables: config.noise_variables,
                latent_codes: config.latent_codes,
            },
            checkpoints: CheckpointManager::new(
                dirs.checkpoints.clone(),
                CheckpointManager::DEFAULT_MAX_CHECKPOINTS,
            ),
            spike_factor: config.divergence_spike_factor,
            timeout: Duration::from_secs(config.worker.request_timeout_secs),
            process: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dirs.logs.join("metrics.json")
    }

    /// Ask the worker to exit and wait briefly; kills it if it lingers.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        let line = serde_json::to_string(&WorkerRequest::Shutdown)?;
        if let Err(e) = process.send(&line).await {
            debug!(error = %e, "Worker already gone");
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, process.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(%status, "Worker exited");
            }
            Err(_) => {
                warn!("Worker ignored shutdown, killing it");
                process.child.kill().await?;
            }
        }
        Ok(())
    }

    async fn request(&mut self, request: WorkerRequest) -> Result<WorkerResponse> {
        let op = request.op();
        let timeout = self.timeout;
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| InfoGanError::worker("worker session not initialised"))?;
        let line = serde_json::to_string(&request)?;

        let response = tokio::time::timeout(timeout, async {
            process.send(&line).await?;
            process.receive().await
        })
        .await
        .map_err(|_| {
            InfoGanError::Timeout(format!(
                "worker '{op}' request exceeded {}s",
                timeout.as_secs_f64()
            ))
        })??;

        match response {
            WorkerResponse::Error { message } => {
                Err(InfoGanError::model(format!("worker failed '{op}': {message}")))
            }
            other => Ok(other),
        }
    }

    async fn expect_losses(&mut self, request: WorkerRequest) -> Result<LossReport> {
        match self.request(request).await? {
            WorkerResponse::Losses(losses) => Ok(losses),
            other => Err(unexpected("losses", &other)),
        }
    }

    async fn expect_written(&mut self, request: WorkerRequest) -> Result<()> {
        match self.request(request).await? {
            WorkerResponse::Written => Ok(()),
            other => Err(unexpected("written", &other)),
        }
    }

    async fn render_samples(
        &mut self,
        iteration: u64,
        noise: &[f32],
        dev_batch: Option<&Batch>,
    ) -> Result<()> {
        if self.visuals.disentangle {
            let path = self
                .dirs
                .samples
                .join(format!("traversal_{iteration:08}.png"));
            let codes =
                latent_traversal(self.visuals.latent_codes, self.visuals.n_disentangle_samples);
            self.expect_written(WorkerRequest::Render {
                noise: noise.to_vec(),
                codes,
                rows: self.visuals.n_disentangle_samples,
                path,
            })
            .await?;
        }
        if self.visuals.reconstruct
            && let Some(batch) = dev_batch
        {
            let path = self
                .dirs
                .samples
                .join(format!("reconstruct_{iteration:08}.png"));
            self.expect_written(WorkerRequest::Reconstruct {
                batch: batch.clone(),
                path,
            })
            .await?;
        }
        Ok(())
    }
}

fn unexpected(wanted: &str, got: &WorkerResponse) -> InfoGanError {
    InfoGanError::worker(format!(
        "expected a '{wanted}' response, got '{}'",
        got.status()
    ))
}

#[async_trait]
impl GenerativeModel for WorkerModel {
    fn name(&self) -> &str {
        &self.settings.command
    }

    async fn init_session(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }
        info!(
            command = %self.settings.command,
            args = ?self.settings.args,
            arch = %self.spec.arch,
            "Starting model worker"
        );
        self.process = Some(WorkerProcess::spawn(&self.settings)?);
        match self
            .request(WorkerRequest::Init {
                spec: self.spec.clone(),
            })
            .await?
        {
            WorkerResponse::Ready => Ok(()),
            other => Err(unexpected("ready", &other)),
        }
    }

    async fn train(
        &mut self,
        schedule: &TrainingSchedule,
        generators: &Generators,
    ) -> Result<TrainingMetrics> {
        self.init_session().await?;
        let restored = self.load().await?;
        let start = restored.map_or(1, |step| step + 1);
        let metrics_path = self.metrics_path();
        let mut metrics = match restored {
            Some(step) => {
                // stats written past the checkpoint are replayed by this run
                let mut metrics: TrainingMetrics =
                    persistence::load_json(&metrics_path)?.unwrap_or_default();
                metrics.rewind_to(step);
                metrics.checkpoints_written =
                    (1..=step).filter(|i| schedule.is_snapshot_step(*i)).count();
                metrics
            }
            None => TrainingMetrics::default(),
        };
        if start > schedule.total_iterations {
            info!(
                start,
                total = schedule.total_iterations,
                "Checkpoint already covers the schedule"
            );
            return Ok(metrics);
        }
        info!(start, total = schedule.total_iterations, "Entering training loop");

        let noise = Distribution::uniform(self.visuals.noise_variables)
            .sample(&mut StdRng::seed_from_u64(self.spec.seed), 1);
        let mut guard = DivergenceGuard::new(self.spike_factor, DivergenceGuard::DEFAULT_WINDOW);
        let mut train = generators.train.iter();
        let mut dev = generators.dev.iter();
        let previous_secs = metrics.total_training_time_secs;
        let started = Instant::now();

        for iteration in start..=schedule.total_iterations {
            let mut real = Vec::with_capacity(schedule.batches_per_step);
            for _ in 0..schedule.batches_per_step {
                let batch = train
                    .next()
                    .ok_or_else(|| InfoGanError::dataset("train sequence ran dry"))??;
                real.push(batch);
            }
            let losses = self
                .expect_losses(WorkerRequest::Step { iteration, real })
                .await?;
            guard.check(iteration, &losses)?;

            if schedule.is_stats_step(iteration) {
                let dev_batch = dev.next().transpose()?;
                let dev_critic_loss = match &dev_batch {
                    Some(batch) => Some(
                        self.expect_losses(WorkerRequest::Evaluate {
                            batch: batch.clone(),
                        })
                        .await?
                        .critic_loss,
                    ),
                    None => None,
                };
                let epoch = schedule.epoch_at(iteration);
                info!(
                    iteration,
                    epoch,
                    critic_loss = losses.critic_loss,
                    generator_loss = losses.generator_loss,
                    mi_loss = losses.mi_loss,
                    dev_critic_loss,
                    "Training stats"
                );
                metrics.record_stats(StatsPoint {
                    iteration,
                    epoch,
                    losses,
                    dev_critic_loss,
                });
                metrics.total_training_time_secs =
                    previous_secs + started.elapsed().as_secs_f64();
                persistence::atomic_write_json(&metrics_path, &metrics)?;
                self.render_samples(iteration, &noise, dev_batch.as_ref())
                    .await?;
            }

            if schedule.is_snapshot_step(iteration) {
                let path = self.checkpoints.weights_path(iteration);
                match self
                    .request(WorkerRequest::Snapshot {
                        step: iteration,
                        path: path.clone(),
                    })
                    .await?
                {
                    WorkerResponse::Saved => {}
                    other => return Err(unexpected("saved", &other)),
                }
                let checkpoint = self.checkpoints.save(
                    &self.spec.experiment,
                    iteration,
                    losses.generator_loss,
                    &path,
                )?;
                metrics.checkpoints_written += 1;
                info!(step = iteration, id = %checkpoint.id, "Saved checkpoint");
            }
            metrics.iterations_completed = iteration;
        }

        metrics.total_training_time_secs = previous_secs + started.elapsed().as_secs_f64();
        persistence::atomic_write_json(&metrics_path, &metrics)?;
        Ok(metrics)
    }

    async fn encode(&mut self, batch: &Batch) -> Result<CodeMatrix> {
        match self
            .request(WorkerRequest::Encode {
                batch: batch.clone(),
            })
            .await?
        {
            WorkerResponse::Codes(codes) => {
                codes.validate()?;
                Ok(codes)
            }
            other => Err(unexpected("codes", &other)),
        }
    }

    async fn load(&mut self) -> Result<Option<u64>> {
        let Some(latest) = self.checkpoints.latest()? else {
            debug!(dir = %self.checkpoints.dir().display(), "No checkpoint to restore");
            return Ok(None);
        };
        self.init_session().await?;
        match self
            .request(WorkerRequest::Restore {
                path: latest.path.clone(),
            })
            .await?
        {
            WorkerResponse::Restored { step } => {
                if step != latest.step {
                    warn!(
                        recorded = latest.step,
                        restored = step,
                        "Worker restored a different step than recorded"
                    );
                }
                info!(step, path = %latest.path.display(), "Restored checkpoint");
                Ok(Some(step))
            }
            other => Err(unexpected("restored", &other)),
        }
    }
}
