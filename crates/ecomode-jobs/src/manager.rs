//! Job manager — binds the stop and restart cycles to their schedules.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use ecomode_scaler::logging::{render_message, EVENT_JOB};
use ecomode_scaler::{ok, CycleReport, ReviewAppOrchestrator};

use crate::engine::CronEngine;
use crate::error::JobResult;
use crate::job::{Job, JobAction};

pub const STOP_JOB_NAME: &str = "stop-managed-review-apps";
pub const RESTART_JOB_NAME: &str = "restart-managed-review-apps";

/// Weekdays at 19:00.
pub const DEFAULT_STOP_CRON: &str = "0 0 19 * * 1-5";
/// Weekdays at 08:00.
pub const DEFAULT_RESTART_CRON: &str = "0 0 8 * * 1-5";

type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The two fleet-wide operations a job can trigger.
#[async_trait]
pub trait FleetActions: Send + Sync {
    async fn stop_all_review_apps(&self) -> anyhow::Result<CycleReport>;
    async fn restart_all_review_apps(&self) -> anyhow::Result<CycleReport>;
}

#[async_trait]
impl FleetActions for ReviewAppOrchestrator {
    async fn stop_all_review_apps(&self) -> anyhow::Result<CycleReport> {
        Ok(ReviewAppOrchestrator::stop_all_review_apps(self).await?)
    }

    async fn restart_all_review_apps(&self) -> anyhow::Result<CycleReport> {
        Ok(ReviewAppOrchestrator::restart_all_review_apps(self).await?)
    }
}

/// Cron expressions and zone for the two jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSchedule {
    pub stop_cron: String,
    pub restart_cron: String,
    /// IANA zone name; host local time when `None`.
    pub time_zone: Option<String>,
}

impl Default for JobSchedule {
    fn default() -> Self {
        Self {
            stop_cron: DEFAULT_STOP_CRON.to_string(),
            restart_cron: DEFAULT_RESTART_CRON.to_string(),
            time_zone: None,
        }
    }
}

/// Owns the managed jobs and the engine they are registered with.
pub struct JobManager {
    engine: Arc<dyn CronEngine>,
    jobs: Vec<Job>,
}

impl JobManager {
    /// Build the stop and restart jobs for `fleet`.
    pub fn new(
        fleet: Arc<dyn FleetActions>,
        engine: Arc<dyn CronEngine>,
        schedule: JobSchedule,
    ) -> JobResult<Self> {
        let tz = schedule.time_zone.as_deref();
        let stop = Job::new(STOP_JOB_NAME, schedule.stop_cron, tz, stop_action(&fleet))?;
        let restart = Job::new(
            RESTART_JOB_NAME,
            schedule.restart_cron,
            tz,
            restart_action(&fleet),
        )?;
        Ok(Self::from_jobs(engine, vec![stop, restart]))
    }

    /// Manage an arbitrary set of jobs.
    pub fn from_jobs(engine: Arc<dyn CronEngine>, jobs: Vec<Job>) -> Self {
        Self { engine, jobs }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name() == name)
    }

    /// Start every job. A job that fails to start is logged and skipped;
    /// the others still start. Returns the number of running jobs.
    pub async fn start_jobs(&mut self) -> usize {
        for job in &mut self.jobs {
            if let Err(e) = job.start(self.engine.as_ref()).await {
                error!(event = EVENT_JOB, job = %job.name(), error = %e, "failed to start job");
            }
        }
        let running = self.jobs.iter().filter(|job| job.is_running()).count();
        info!(event = EVENT_JOB, running, total = self.jobs.len(), "jobs started");
        running
    }

    /// Stop every job, whatever its state.
    pub async fn stop_jobs(&mut self) {
        for job in &mut self.jobs {
            match job.stop(self.engine.as_ref()).await {
                Ok(()) => info!(event = EVENT_JOB, job = %job.name(), "job stopped"),
                Err(e) => error!(
                    event = EVENT_JOB,
                    job = %job.name(),
                    error = %e,
                    "job stopped with engine error"
                ),
            }
        }
    }
}

fn stop_action(fleet: &Arc<dyn FleetActions>) -> JobAction {
    let fleet = Arc::clone(fleet);
    Arc::new(move || -> ActionFuture {
        let fleet = Arc::clone(&fleet);
        Box::pin(async move {
            let report = fleet.stop_all_review_apps().await?;
            log_cycle(STOP_JOB_NAME, &report);
            Ok(())
        })
    })
}

fn restart_action(fleet: &Arc<dyn FleetActions>) -> JobAction {
    let fleet = Arc::clone(fleet);
    Arc::new(move || -> ActionFuture {
        let fleet = Arc::clone(&fleet);
        Box::pin(async move {
            let report = fleet.restart_all_review_apps().await?;
            log_cycle(RESTART_JOB_NAME, &report);
            Ok(())
        })
    })
}

fn log_cycle(job: &str, report: &CycleReport) {
    let summary = render_message(report);
    if report.failed > 0 {
        warn!(
            event = EVENT_JOB,
            %job,
            failed = report.failed,
            %summary,
            "cycle finished with failures"
        );
    } else {
        ok!(event = EVENT_JOB, %job, %summary, "cycle finished");
    }
}
