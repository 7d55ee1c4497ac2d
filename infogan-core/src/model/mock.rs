//! Deterministic in-process model for tests and dry runs.

use super::GenerativeModel;
use crate::data::{Batch, Generators};
use crate::error::{InfoGanError, Result};
use crate::export::CodeMatrix;
use crate::training::{DivergenceGuard, LossReport, StatsPoint, TrainingMetrics, TrainingSchedule};
use async_trait::async_trait;

/// A call observed by [`MockModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    InitSession,
    Train { total_iterations: u64 },
    Encode { batch_size: usize },
    Load,
}

/// Records calls and fakes training.
///
/// Training pulls real batches, reports `generator_loss = 1 / iteration` and leaves the
/// last iteration as the restorable step. Encoding maps each image to its mean pixel
/// value repeated across every code dimension.
#[derive(Debug, Clone)]
pub struct MockModel {
    latent_codes: usize,
    restored_step: Option<u64>,
    diverge_at: Option<u64>,
    session: bool,
    batches_trained: usize,
    calls: Vec<MockCall>,
}

impl MockModel {
    pub fn new(latent_codes: usize) -> Self {
        Self {
            latent_codes,
            restored_step: None,
            diverge_at: None,
            session: false,
            batches_trained: 0,
            calls: Vec::new(),
        }
    }

    /// Pretend a checkpoint at `step` exists (`None` for a fresh model).
    pub fn with_restored_step(mut self, step: Option<u64>) -> Self {
        self.restored_step = step;
        self
    }

    /// Report a NaN generator loss at `iteration`.
    pub fn with_divergence_at(mut self, iteration: u64) -> Self {
        self.diverge_at = Some(iteration);
        self
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Real batches pulled from the train sequence across all `train` calls.
    pub fn batches_trained(&self) -> usize {
        self.batches_trained
    }

    pub fn batches_encoded(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, MockCall::Encode { .. }))
            .count()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn init_session(&mut self) -> Result<()> {
        self.calls.push(MockCall::InitSession);
        self.session = true;
        Ok(())
    }

    async fn train(
        &mut self,
        schedule: &TrainingSchedule,
        generators: &Generators,
    ) -> Result<TrainingMetrics> {
        self.calls.push(MockCall::Train {
            total_iterations: schedule.total_iterations,
        });
        let mut metrics = TrainingMetrics::default();
        let mut guard = DivergenceGuard::default();
        let mut train = generators.train.iter();

        for iteration in 1..=schedule.total_iterations {
            for _ in 0..schedule.batches_per_step {
                train
                    .next()
                    .ok_or_else(|| InfoGanError::dataset("train sequence ran dry"))??;
                self.batches_trained += 1;
            }
            let generator_loss = if self.diverge_at == Some(iteration) {
                f64::NAN
            } else {
                1.0 / iteration as f64
            };
            let losses = LossReport {
                critic_loss: -generator_loss,
                generator_loss,
                mi_loss: 0.0,
            };
            guard.check(iteration, &losses)?;

            if schedule.is_snapshot_step(iteration) {
                self.restored_step = Some(iteration);
                metrics.checkpoints_written += 1;
            }
            if schedule.is_stats_step(iteration) {
                metrics.record_stats(StatsPoint {
                    iteration,
                    epoch: schedule.epoch_at(iteration),
                    losses,
                    dev_critic_loss: None,
                });
            }
            metrics.iterations_completed = iteration;
        }
        Ok(metrics)
    }

    async fn encode(&mut self, batch: &Batch) -> Result<CodeMatrix> {
        if !self.session {
            return Err(InfoGanError::model("encode called before init_session"));
        }
        self.calls.push(MockCall::Encode {
            batch_size: batch.size,
        });
        let mut data = Vec::with_capacity(batch.size * self.latent_codes);
        for i in 0..batch.size {
            let image = batch.image(i);
            let mean = image.iter().sum::<f32>() / image.len().max(1) as f32;
            data.extend(std::iter::repeat_n(mean, self.latent_codes));
        }
        CodeMatrix::new(batch.size, self.latent_codes, data)
    }

    async fn load(&mut self) -> Result<Option<u64>> {
        self.calls.push(MockCall::Load);
        Ok(self.restored_step)
    }
}
