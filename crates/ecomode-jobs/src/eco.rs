//! Eco mode — the switch the daemon flips.

use std::sync::Arc;

use tracing::info;

use ecomode_scaler::logging::EVENT_JOB;

use ecomode_client::ControlPlane;
use ecomode_scaler::{ReviewAppOrchestrator, ScalerConfig};

use crate::engine::CronEngine;
use crate::error::JobResult;
use crate::manager::{FleetActions, JobManager, JobSchedule};

/// Turns the nightly stop and morning restart on and off.
pub struct EcoModeManager {
    jobs: JobManager,
}

impl EcoModeManager {
    pub fn new(jobs: JobManager) -> Self {
        Self { jobs }
    }

    /// Wire an orchestrator for `client` into a job manager on `engine`.
    pub fn for_control_plane(
        client: Arc<dyn ControlPlane>,
        config: ScalerConfig,
        engine: Arc<dyn CronEngine>,
        schedule: JobSchedule,
    ) -> JobResult<Self> {
        let fleet: Arc<dyn FleetActions> = Arc::new(ReviewAppOrchestrator::new(client, config));
        Ok(Self::new(JobManager::new(fleet, engine, schedule)?))
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub async fn start_eco_mode(&mut self) -> usize {
        info!(event = EVENT_JOB, "starting eco mode");
        self.jobs.start_jobs().await
    }

    pub async fn stop_eco_mode(&mut self) {
        info!(event = EVENT_JOB, "stopping eco mode");
        self.jobs.stop_jobs().await;
    }
}
