//! Training experiment tracking.

use super::schedule::TrainingSchedule;
use crate::error::Result;
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Training status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Record of one experiment, kept as `experiment.json` at the experiment root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub name: String,
    pub status: TrainingStatus,
    pub config: serde_json::Value,
    pub schedule: Option<TrainingSchedule>,
    pub last_step: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentRecord {
    pub const FILE_NAME: &'static str = "experiment.json";

    pub fn new(name: &str, config: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: TrainingStatus::Pending,
            config,
            schedule: None,
            last_step: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Existing record for the experiment in `root`, if any.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        Ok(persistence::load_json(&root.join(Self::FILE_NAME))?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        persistence::atomic_write_json(&root.join(Self::FILE_NAME), self)?;
        Ok(())
    }

    pub fn mark(&mut self, status: TrainingStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
