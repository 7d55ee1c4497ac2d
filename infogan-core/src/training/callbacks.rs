//! Divergence detection on per-step losses.

use super::metrics::LossReport;
use crate::error::{InfoGanError, Result};
use std::collections::VecDeque;

/// Stops training on non-finite losses, and optionally on generator-loss spikes.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    /// Flag a spike when `|loss|` exceeds this multiple of the window's mean magnitude.
    pub spike_factor: Option<f64>,
    window: VecDeque<f64>,
    window_size: usize,
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self::new(None, Self::DEFAULT_WINDOW)
    }
}

impl DivergenceGuard {
    pub const DEFAULT_WINDOW: usize = 20;

    pub fn new(spike_factor: Option<f64>, window_size: usize) -> Self {
        Self {
            spike_factor,
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
        }
    }

    pub fn check(&mut self, iteration: u64, losses: &LossReport) -> Result<()> {
        if let Some((name, value)) = losses.first_non_finite() {
            return Err(InfoGanError::Divergence {
                iteration,
                detail: format!("{name} is {value}"),
            });
        }

        let magnitude = losses.generator_loss.abs();
        if let Some(factor) = self.spike_factor
            && self.window.len() >= 3
        {
            let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
            if mean > 0.0 && magnitude > mean * factor {
                return Err(InfoGanError::Divergence {
                    iteration,
                    detail: format!(
                        "generator_loss {} exceeds {factor}x the recent mean magnitude {mean:.4}",
                        losses.generator_loss
                    ),
                });
            }
        }

        self.window.push_back(magnitude);
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }
        Ok(())
    }
}
