//! Checkpoint management for training runs.

use crate::error::Result;
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A saved set of model weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub experiment: String,
    pub step: u64,
    pub loss: f64,
    pub path: PathBuf,
    pub hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Tracks checkpoints in `checkpoints.json` inside the checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointManager {
    pub const MANIFEST: &'static str = "checkpoints.json";
    pub const DEFAULT_MAX_CHECKPOINTS: usize = 5;

    pub fn new(dir: PathBuf, max_checkpoints: usize) -> Self {
        Self {
            dir,
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the weights for `step` should be written.
    pub fn weights_path(&self, step: u64) -> PathBuf {
        self.dir.join(format!("step_{step:08}.ckpt"))
    }

    /// Checkpoints in the order they were saved.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        Ok(persistence::load_json(&self.dir.join(Self::MANIFEST))?.unwrap_or_default())
    }

    /// The checkpoint with the highest step.
    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        Ok(self.list()?.into_iter().max_by_key(|c| c.step))
    }

    /// The checkpoint with the lowest loss.
    pub fn best(&self) -> Result<Option<Checkpoint>> {
        Ok(self.list()?.into_iter().min_by(|a, b| {
            a.loss
                .partial_cmp(&b.loss)
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }

    /// Register weights already written to `path`, evicting the oldest entries past the limit.
    pub fn save(&self, experiment: &str, step: u64, loss: f64, path: &Path) -> Result<Checkpoint> {
        std::fs::create_dir_all(&self.dir)?;

        let mut hasher = Sha256::new();
        let size_bytes = match std::fs::read(path) {
            Ok(bytes) => {
                hasher.update(&bytes);
                bytes.len() as u64
            }
            Err(_) => {
                hasher.update(experiment.as_bytes());
                hasher.update(step.to_le_bytes());
                hasher.update(loss.to_le_bytes());
                0
            }
        };

        let checkpoint = Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            experiment: experiment.to_string(),
            step,
            loss,
            path: path.to_path_buf(),
            hash: format!("{:x}", hasher.finalize()),
            size_bytes,
            created_at: Utc::now(),
        };

        let mut checkpoints = self.list()?;
        checkpoints.retain(|c| c.step != step);
        checkpoints.push(checkpoint.clone());

        while checkpoints.len() > self.max_checkpoints {
            let evicted = checkpoints.remove(0);
            if evicted.path.exists()
                && let Err(e) = std::fs::remove_file(&evicted.path)
            {
                warn!(
                    path = %evicted.path.display(),
                    error = %e,
                    "Failed to remove old checkpoint"
                );
            }
            debug!(step = evicted.step, "Evicted checkpoint");
        }

        persistence::atomic_write_json(&self.dir.join(Self::MANIFEST), &checkpoints)?;
        Ok(checkpoint)
    }
}
