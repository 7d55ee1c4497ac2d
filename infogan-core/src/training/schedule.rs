//! Iteration schedule derived from epoch-based settings.

use crate::config::{EpochFraction, Objective, RunConfig};
use crate::error::{InfoGanError, Result};
use serde::{Deserialize, Serialize};

/// Absolute iteration counts for one training run.
///
/// Iterations are numbered from 1; iteration `i` is the `i`-th generator step.
/// An iteration consumes `batches_per_step` train batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSchedule {
    pub iterations_per_epoch: u64,
    pub stats_interval: u64,
    pub snapshot_interval: u64,
    pub total_iterations: u64,
    pub batches_per_step: usize,
}

impl TrainingSchedule {
    pub fn derive(
        n_train: usize,
        batch_size: usize,
        objective: &Objective,
        epochs: usize,
        epochs_per_stats: EpochFraction,
        snapshot_interval: EpochFraction,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(InfoGanError::config("batch_size must be at least 1"));
        }
        let batches_per_epoch = (n_train / batch_size) as u64;
        let iterations_per_epoch = objective.iterations_per_epoch(batches_per_epoch);
        Ok(Self {
            iterations_per_epoch,
            stats_interval: epochs_per_stats.of(iterations_per_epoch),
            snapshot_interval: snapshot_interval.of(iterations_per_epoch),
            total_iterations: epochs as u64 * iterations_per_epoch,
            batches_per_step: objective.batches_per_step(),
        })
    }

    pub fn for_config(config: &RunConfig, n_train: usize, batch_size: usize) -> Result<Self> {
        Self::derive(
            n_train,
            batch_size,
            &config.objective,
            config.epochs,
            config.epochs_per_stats,
            config.snapshot_interval,
        )
    }

    /// Stats are reported every `stats_interval` iterations and always at the last one.
    pub fn is_stats_step(&self, iteration: u64) -> bool {
        Self::hits(iteration, self.stats_interval, self.total_iterations)
    }

    /// Snapshots follow the same rule as stats with `snapshot_interval`.
    pub fn is_snapshot_step(&self, iteration: u64) -> bool {
        Self::hits(iteration, self.snapshot_interval, self.total_iterations)
    }

    fn hits(iteration: u64, interval: u64, total: u64) -> bool {
        if iteration == 0 || iteration > total {
            return false;
        }
        iteration == total || (interval > 0 && iteration % interval == 0)
    }

    /// Whether the last regular stats report coincides with the end of training.
    pub fn stats_aligned(&self) -> bool {
        self.stats_interval > 0 && self.total_iterations % self.stats_interval == 0
    }

    pub fn snapshot_aligned(&self) -> bool {
        self.snapshot_interval > 0 && self.total_iterations % self.snapshot_interval == 0
    }

    /// Fractional epoch reached after `iteration` steps.
    pub fn epoch_at(&self, iteration: u64) -> f64 {
        if self.iterations_per_epoch == 0 {
            return 0.0;
        }
        iteration as f64 / self.iterations_per_epoch as f64
    }
}
