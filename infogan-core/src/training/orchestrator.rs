//! Turns a resolved configuration into a schedule and drives the model through it.

use super::experiment::{ExperimentRecord, TrainingStatus};
use super::metrics::TrainingMetrics;
use super::schedule::TrainingSchedule;
use crate::config::RunConfig;
use crate::data::{DataManager, DataOptions, Dataset};
use crate::dirs::DirectorySet;
use crate::error::Result;
use crate::model::GenerativeModel;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct TrainingOrchestrator<'a> {
    config: &'a RunConfig,
    dirs: &'a DirectorySet,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(config: &'a RunConfig, dirs: &'a DirectorySet) -> Self {
        Self { config, dirs }
    }

    /// Warn about advisories, prepare cyclic generators, derive the schedule and train.
    ///
    /// Model failures are recorded in `experiment.json` and returned unchanged.
    pub async fn run(
        &self,
        model: &mut dyn GenerativeModel,
        dataset: Arc<dyn Dataset>,
    ) -> Result<TrainingMetrics> {
        for advisory in self.config.advisories() {
            warn!(%advisory, "Proceeding despite advisory");
        }

        let mut manager = DataManager::new(dataset, DataOptions::training(self.config))?;
        manager.inf_generators();
        let generators = manager.get_generators()?;

        let schedule =
            TrainingSchedule::for_config(self.config, manager.n_train(), manager.batch_size())?;
        self.log_schedule(&schedule);

        let mut record = match ExperimentRecord::load(&self.dirs.root)? {
            Some(record) => record,
            None => {
                ExperimentRecord::new(&self.config.exp_name, serde_json::to_value(self.config)?)
            }
        };
        record.schedule = Some(schedule);
        record.error = None;
        record.mark(TrainingStatus::Running);
        record.save(&self.dirs.root)?;

        match model.train(&schedule, &generators).await {
            Ok(metrics) => {
                record.last_step = Some(metrics.iterations_completed);
                record.mark(TrainingStatus::Completed);
                record.save(&self.dirs.root)?;
                info!(
                    experiment = %self.config.exp_name,
                    iterations = metrics.iterations_completed,
                    best_generator_loss = ?metrics.best_generator_loss,
                    "Training completed"
                );
                Ok(metrics)
            }
            Err(e) => {
                error!(experiment = %self.config.exp_name, error = %e, "Training failed");
                record.error = Some(e.to_string());
                record.mark(TrainingStatus::Failed);
                if let Err(save_err) = record.save(&self.dirs.root) {
                    warn!(error = %save_err, "Could not record training failure");
                }
                Err(e)
            }
        }
    }

    fn log_schedule(&self, schedule: &TrainingSchedule) {
        info!(
            model = %self.config.arch,
            objective = self.config.objective.name(),
            iterations_per_epoch = schedule.iterations_per_epoch,
            stats_interval = schedule.stats_interval,
            snapshot_interval = schedule.snapshot_interval,
            total_iterations = schedule.total_iterations,
            "Derived training schedule"
        );
        if schedule.total_iterations == 0 {
            warn!("Schedule has no iterations; the training split is smaller than one step");
        }
        if !schedule.stats_aligned() {
            warn!(
                stats_interval = schedule.stats_interval,
                total_iterations = schedule.total_iterations,
                "Stats interval does not divide the run; the final iteration reports anyway"
            );
        }
        if !schedule.snapshot_aligned() {
            warn!(
                snapshot_interval = schedule.snapshot_interval,
                total_iterations = schedule.total_iterations,
                "Snapshot interval does not divide the run; the final iteration snapshots anyway"
            );
        }
    }
}
