//! Batch-encoding a dataset into latent codes and persisting the table.

pub mod npy;

use crate::config::RunConfig;
use crate::data::{DataManager, DataOptions, Dataset};
use crate::dirs::DirectorySet;
use crate::error::{InfoGanError, Result};
use crate::model::GenerativeModel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Requested batch size for export, shrunk to divide the split.
pub const EXPORT_BATCH_SIZE: usize = 500;

/// Row-major `f32` table with one row per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl CodeMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let matrix = Self { rows, cols, data };
        matrix.validate()?;
        Ok(matrix)
    }

    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    /// Checks `data.len() == rows * cols`; needed after deserialising.
    pub fn validate(&self) -> Result<()> {
        if self.rows * self.cols != self.data.len() {
            return Err(InfoGanError::model(format!(
                "code matrix {}x{} carries {} values",
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Stack `parts` vertically, preserving their order.
    pub fn vstack(parts: Vec<CodeMatrix>) -> Result<Self> {
        let Some(cols) = parts.first().map(|m| m.cols) else {
            return Ok(Self::from_parts(0, 0, Vec::new()));
        };
        let mut rows = 0;
        let mut data = Vec::with_capacity(parts.iter().map(|m| m.data.len()).sum());
        for part in parts {
            if part.cols != cols {
                return Err(InfoGanError::model(format!(
                    "cannot stack a {}-column block onto {cols} columns",
                    part.cols
                )));
            }
            rows += part.rows;
            data.extend(part.data);
        }
        Ok(Self::from_parts(rows, cols, data))
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub cols: usize,
    pub batch_size: usize,
    pub restored_step: u64,
}

/// Encodes every sample of the dataset with a trained model.
pub struct CodeExporter<'a> {
    config: &'a RunConfig,
    dirs: &'a DirectorySet,
}

impl<'a> CodeExporter<'a> {
    pub fn new(config: &'a RunConfig, dirs: &'a DirectorySet) -> Self {
        Self { config, dirs }
    }

    pub fn output_path(&self) -> PathBuf {
        self.dirs
            .codes
            .join(format!("codes_{}.npy", self.config.exp_name))
    }

    pub async fn export(
        &self,
        model: &mut dyn GenerativeModel,
        dataset: Arc<dyn Dataset>,
    ) -> Result<ExportSummary> {
        let mut manager = DataManager::new(dataset, DataOptions::export(EXPORT_BATCH_SIZE))?;
        let batch_size = manager.set_divisor_batch_size()?;
        let generators = manager.get_generators()?;

        model.init_session().await?;
        let restored_step = match model.load().await? {
            Some(step) if step > 1 => step,
            other => {
                return Err(InfoGanError::precondition(format!(
                    "no trained checkpoint for '{}' (restored step: {other:?}); train first",
                    self.config.exp_name
                )));
            }
        };
        info!(
            experiment = %self.config.exp_name,
            restored_step,
            n_samples = manager.n_train(),
            batch_size,
            "Exporting latent codes"
        );

        let started = Instant::now();
        let mut parts = Vec::with_capacity(generators.train.batches_per_pass());
        for (batch_num, batch) in generators.train.iter().enumerate() {
            let batch = batch?;
            let codes = model.encode(&batch).await?;
            if codes.rows() != batch.size || codes.cols() != self.config.latent_codes {
                return Err(InfoGanError::model(format!(
                    "encode returned {}x{} for a batch of {} with {} codes",
                    codes.rows(),
                    codes.cols(),
                    batch.size,
                    self.config.latent_codes
                )));
            }
            if batch_num < 5 || batch_num % 100 == 0 {
                info!(batch_num, rows = codes.rows(), "Encoded batch");
            }
            parts.push(codes);
        }

        let table = CodeMatrix::vstack(parts)?;
        let path = self.output_path();
        std::fs::create_dir_all(&self.dirs.codes)?;
        npy::write(&path, &table)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Encoding finished");
        info!(
            path = %path.display(),
            rows = table.rows(),
            cols = table.cols(),
            "Saved latent codes"
        );

        Ok(ExportSummary {
            path,
            rows: table.rows(),
            cols: table.cols(),
            batch_size,
            restored_step,
        })
    }
}
