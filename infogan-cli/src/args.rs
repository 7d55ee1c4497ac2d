//! Command-line flags.
//!
//! Every run setting is optional here so that only flags given explicitly override the
//! config file and environment layers.

use clap::Parser;
use infogan_core::config::{SettingsOverrides, WorkerOverrides};
use std::path::PathBuf;

/// Train a regularised GAN and export its latent codes.
#[derive(Parser, Debug)]
#[command(name = "infogan", version, about, long_about = None)]
pub struct Cli {
    /// Number of epochs to train [default: 25]
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Log stats every this many epochs; fractions allowed [default: 0.5]
    #[arg(long)]
    pub epochs_per_stats: Option<f64>,

    /// Save a checkpoint every this many epochs; fractions allowed [default: 0.5]
    #[arg(long)]
    pub snapshot_interval: Option<f64>,

    /// Number of regularised latent variables [default: 6]
    #[arg(long)]
    pub latent_codes: Option<usize>,

    /// Number of unregularised latent variables [default: 128]
    #[arg(long)]
    pub noise_variables: Option<usize>,

    /// Fix the standard deviation of the latent codes [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fix_std: Option<bool>,

    /// Mutual information coefficient [default: 8.0]
    #[arg(long)]
    pub mi_coeff: Option<f64>,

    /// Gradient penalty coefficient [default: 10.0]
    #[arg(long)]
    pub gp_coeff: Option<f64>,

    /// Critic updates per generator update [default: 5]
    #[arg(long)]
    pub critic_iters: Option<usize>,

    /// Batch size [default: 64]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Channels-first image shape [default: (3,64,64)]
    #[arg(long)]
    pub image_shape: Option<String>,

    /// Image file extension [default: .jpeg]
    #[arg(long)]
    pub file_ext: Option<String>,

    /// Objective: gan or wgan-gp [default: wgan-gp]
    #[arg(long)]
    pub mode: Option<String>,

    /// Experiment name; derived from the hyperparameters when omitted
    #[arg(long)]
    pub exp_name: Option<String>,

    /// Architecture: low_cap, high_cap, dcgan or resnet [default: resnet]
    #[arg(long)]
    pub arch: Option<String>,

    /// Directory holding experiment outputs [default: ./]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Dataset directory; codes are written to <data-dir>/codes [default: ../../data]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Withhold factor combinations from the training split [default: false]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub gaps: Option<bool>,

    /// Run training [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub train: Option<bool>,

    /// Encode the dataset with the latest checkpoint and save the codes [default: false]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub save_codes: Option<bool>,

    /// Render reconstructions at stats points [default: false]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub visualize_reconstruct: Option<bool>,

    /// Render latent traversals at stats points [default: true]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub visualize_disentangle: Option<bool>,

    /// Values per code in traversal grids [default: 10]
    #[arg(long)]
    pub n_disentangle_samples: Option<usize>,

    /// Seed for split permutation and shuffling [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop training when the generator loss exceeds this multiple of its recent mean
    #[arg(long)]
    pub divergence_spike_factor: Option<f64>,

    /// Model worker executable [default: python3]
    #[arg(long)]
    pub worker: Option<String>,

    /// Argument passed to the worker (repeatable) [default: -m infogan_worker]
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    pub worker_args: Vec<String>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors to the terminal
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// The explicitly given run settings.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            epochs: self.epochs,
            epochs_per_stats: self.epochs_per_stats,
            snapshot_interval: self.snapshot_interval,
            latent_codes: self.latent_codes,
            noise_variables: self.noise_variables,
            fix_std: self.fix_std,
            mi_coeff: self.mi_coeff,
            gp_coeff: self.gp_coeff,
            critic_iters: self.critic_iters,
            batch_size: self.batch_size,
            image_shape: self.image_shape.clone(),
            file_ext: self.file_ext.clone(),
            mode: self.mode.clone(),
            exp_name: self.exp_name.clone(),
            arch: self.arch.clone(),
            output_dir: self.output_dir.clone(),
            data_dir: self.data_dir.clone(),
            gaps: self.gaps,
            train: self.train,
            save_codes: self.save_codes,
            visualize_reconstruct: self.visualize_reconstruct,
            visualize_disentangle: self.visualize_disentangle,
            n_disentangle_samples: self.n_disentangle_samples,
            seed: self.seed,
            divergence_spike_factor: self.divergence_spike_factor,
            worker: WorkerOverrides {
                command: self.worker.clone(),
                args: (!self.worker_args.is_empty()).then(|| self.worker_args.clone()),
            },
        }
    }

    /// Terminal log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
