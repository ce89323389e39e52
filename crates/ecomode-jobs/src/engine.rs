//! Cron engines — what turns a schedule expression into ticks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::debug;
use uuid::Uuid;

use ecomode_scaler::logging::EVENT_JOB;

use crate::error::{JobError, JobResult};

/// Handle of a registration inside an engine.
pub type JobKey = Uuid;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Zero-argument callback fired on every tick.
pub type TickFn = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

/// What an engine needs to know to schedule a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    /// Cron expression with a leading seconds field (`0 0 19 * * 1-5`).
    pub schedule: String,
    /// Zone the expression is evaluated in; host local time when `None`.
    pub time_zone: Option<Tz>,
}

/// Fires registered callbacks at the wall-clock times of their schedules.
#[async_trait]
pub trait CronEngine: Send + Sync {
    /// Register `tick` to fire on `spec.schedule` until removed.
    async fn add(&self, spec: &JobSpec, tick: TickFn) -> JobResult<JobKey>;

    /// Stop firing a registration.
    async fn remove(&self, key: JobKey) -> JobResult<()>;
}

/// [`CronEngine`] backed by `tokio-cron-scheduler`.
pub struct TokioCronEngine {
    scheduler: Mutex<JobScheduler>,
}

impl TokioCronEngine {
    /// Create the underlying scheduler and start its timer loop.
    pub async fn start() -> JobResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| JobError::Engine(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| JobError::Engine(e.to_string()))?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Stop the timer loop. Registered jobs no longer fire.
    pub async fn shutdown(&self) -> JobResult<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| JobError::Engine(e.to_string()))
    }
}

fn runner(tick: TickFn) -> impl FnMut(Uuid, JobScheduler) -> BoxFuture + Send + Sync + 'static {
    move |_key, _scheduler| tick()
}

#[async_trait]
impl CronEngine for TokioCronEngine {
    async fn add(&self, spec: &JobSpec, tick: TickFn) -> JobResult<JobKey> {
        let job = match spec.time_zone {
            Some(tz) => CronJob::new_async_tz(spec.schedule.as_str(), tz, runner(tick)),
            None => CronJob::new_async_tz(spec.schedule.as_str(), chrono::Local, runner(tick)),
        }
        .map_err(|e| JobError::InvalidSchedule {
            job: spec.name.clone(),
            schedule: spec.schedule.clone(),
            detail: e.to_string(),
        })?;

        let key = self
            .scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| JobError::Engine(e.to_string()))?;
        debug!(event = EVENT_JOB, job = %spec.name, %key, "cron job registered");
        Ok(key)
    }

    async fn remove(&self, key: JobKey) -> JobResult<()> {
        self.scheduler
            .lock()
            .await
            .remove(&key)
            .await
            .map_err(|e| JobError::Engine(e.to_string()))
    }
}
