//! Generative model facade.
//!
//! The orchestrator and exporter talk to the model only through [`GenerativeModel`].
//! [`WorkerModel`] drives an external compute process; [`MockModel`] is in-process
//! and deterministic.

pub mod mock;
pub mod protocol;
pub mod worker;

pub use mock::{MockCall, MockModel};
pub use protocol::{WorkerRequest, WorkerResponse};
pub use worker::WorkerModel;

use crate::config::{Architecture, ImageShape, Objective, RunConfig};
use crate::data::{Batch, Generators};
use crate::distributions::Priors;
use crate::error::Result;
use crate::export::CodeMatrix;
use crate::training::{TrainingMetrics, TrainingSchedule};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a model needs to build its networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub experiment: String,
    pub arch: Architecture,
    pub objective: Objective,
    pub priors: Priors,
    pub image_shape: ImageShape,
    pub batch_size: usize,
    pub mi_coeff: f64,
    pub seed: u64,
}

impl ModelSpec {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            experiment: config.exp_name.clone(),
            arch: config.arch,
            objective: config.objective,
            priors: Priors::from_config(config),
            image_shape: config.image_shape,
            batch_size: config.batch_size,
            mi_coeff: config.mi_coeff,
            seed: config.seed,
        }
    }

    pub fn latent_codes(&self) -> usize {
        self.priors.codes.dim()
    }
}

/// A regularised adversarial model that can be trained, restored and used as an encoder.
///
/// Calls are issued one at a time; implementations own their compute session.
#[async_trait]
pub trait GenerativeModel: Send {
    fn name(&self) -> &str;

    /// Bring up the compute context. Required before `encode`; repeated calls are no-ops.
    async fn init_session(&mut self) -> Result<()>;

    /// Run the alternating optimisation loop for the whole schedule.
    async fn train(
        &mut self,
        schedule: &TrainingSchedule,
        generators: &Generators,
    ) -> Result<TrainingMetrics>;

    /// One row of codes per image in `batch`.
    async fn encode(&mut self, batch: &Batch) -> Result<CodeMatrix>;

    /// Restore the latest checkpoint; `None` when there is nothing to restore.
    async fn load(&mut self) -> Result<Option<u64>>;
}
