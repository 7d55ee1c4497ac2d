//! Training metrics tracking.

use serde::{Deserialize, Serialize};

/// Losses reported by one generator step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub critic_loss: f64,
    pub generator_loss: f64,
    pub mi_loss: f64,
}

impl LossReport {
    /// Name and value of the first loss that is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [
            ("critic_loss", self.critic_loss),
            ("generator_loss", self.generator_loss),
            ("mi_loss", self.mi_loss),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
    }
}

/// One stats report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsPoint {
    pub iteration: u64,
    pub epoch: f64,
    pub losses: LossReport,
    pub dev_critic_loss: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub iterations_completed: u64,
    pub history: Vec<StatsPoint>,
    pub best_generator_loss: Option<f64>,
    pub best_iteration: Option<u64>,
    pub checkpoints_written: usize,
    pub total_training_time_secs: f64,
}

impl TrainingMetrics {
    pub fn record_stats(&mut self, point: StatsPoint) {
        self.iterations_completed = self.iterations_completed.max(point.iteration);
        let loss = point.losses.generator_loss;
        if self.best_generator_loss.is_none_or(|best| loss < best) {
            self.best_generator_loss = Some(loss);
            self.best_iteration = Some(point.iteration);
        }
        self.history.push(point);
    }

    /// Forget everything recorded after `step`, as when training resumes from a checkpoint.
    pub fn rewind_to(&mut self, step: u64) {
        self.history.retain(|point| point.iteration <= step);
        self.iterations_completed = step;
        self.best_generator_loss = None;
        self.best_iteration = None;
        for point in &self.history {
            let loss = point.losses.generator_loss;
            if self.best_generator_loss.is_none_or(|best| loss < best) {
                self.best_generator_loss = Some(loss);
                self.best_iteration = Some(point.iteration);
            }
        }
    }

    pub fn last(&self) -> Option<&StatsPoint> {
        self.history.last()
    }
}
