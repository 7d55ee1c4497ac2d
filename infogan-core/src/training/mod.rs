//! Training: schedule maths, orchestration, checkpoints, metrics and experiment records.

pub mod callbacks;
pub mod checkpoint;
pub mod experiment;
pub mod metrics;
pub mod orchestrator;
pub mod schedule;

pub use callbacks::DivergenceGuard;
pub use checkpoint::{Checkpoint, CheckpointManager};
pub use experiment::{ExperimentRecord, TrainingStatus};
pub use metrics::{LossReport, StatsPoint, TrainingMetrics};
pub use orchestrator::TrainingOrchestrator;
pub use schedule::TrainingSchedule;
