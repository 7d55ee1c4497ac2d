//! # infogan-core: training orchestration for regularised adversarial models
//!
//! This crate turns epoch-based run settings into a concrete iteration schedule,
//! partitions image datasets (optionally withholding factor combinations for
//! zero-shot evaluation), drives a generative model through training, and batch-encodes
//! a dataset into latent codes once a checkpoint exists.
//!
//! The networks themselves live behind [`model::GenerativeModel`]; the shipped
//! implementation talks to an external worker process over newline-delimited JSON.

// Foundation
pub mod config;
pub mod dirs;
pub mod error;
pub mod persistence;

// Inputs
pub mod data;
pub mod distributions;

// Model facade
pub mod model;

// Training & export
pub mod export;
pub mod training;

// Re-exports
pub use config::{
    Architecture, EpochFraction, ImageShape, Objective, RunConfig, RunSettings, SettingsOverrides,
    load_settings, parse_image_shape,
};
pub use data::{Batch, DataManager, DataOptions, Dataset, Generators, ImageFolder, InMemoryDataset};
pub use dirs::DirectorySet;
pub use error::{InfoGanError, Result};
pub use export::{CodeExporter, CodeMatrix, EXPORT_BATCH_SIZE, ExportSummary};
pub use model::{GenerativeModel, MockModel, ModelSpec, WorkerModel};
pub use training::{TrainingMetrics, TrainingOrchestrator, TrainingSchedule};
