//! Error types for the infogan-core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InfoGanError>;

/// Top-level error type for orchestration, data and model operations.
#[derive(Debug, Error)]
pub enum InfoGanError {
    #[error("Parse error in '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Training diverged at iteration {iteration}: {detail}")]
    Divergence { iteration: u64, detail: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl InfoGanError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Whether this error was raised before any resource was allocated.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Config(_))
    }
}
