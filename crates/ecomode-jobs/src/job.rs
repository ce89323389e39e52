//! A single recurring job: one cron expression bound to one action.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{error, info, warn};

use ecomode_scaler::logging::EVENT_JOB;

use crate::engine::{CronEngine, JobKey, JobSpec, TickFn};
use crate::error::{JobError, JobResult};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The work a job performs on each tick.
pub type JobAction = Arc<dyn Fn() -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Started(JobKey),
    Stopped,
}

pub struct Job {
    spec: JobSpec,
    action: JobAction,
    state: JobState,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Build a job. `time_zone` is an IANA name (`Europe/Paris`); `None`
    /// leaves the schedule in host local time.
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        time_zone: Option<&str>,
        action: JobAction,
    ) -> JobResult<Self> {
        let time_zone = time_zone.map(parse_time_zone).transpose()?;
        Ok(Self {
            spec: JobSpec {
                name: name.into(),
                schedule: schedule.into(),
                time_zone,
            },
            action,
            state: JobState::Created,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, JobState::Started(_))
    }

    /// Register the job with `engine`. Starting a running job is a no-op.
    pub async fn start(&mut self, engine: &dyn CronEngine) -> JobResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let key = engine.add(&self.spec, self.tick()).await?;
        self.state = JobState::Started(key);
        info!(
            event = EVENT_JOB,
            job = %self.spec.name,
            schedule = %self.spec.schedule,
            time_zone = self.spec.time_zone.map(|tz| tz.name()).unwrap_or("local"),
            "job started"
        );
        Ok(())
    }

    /// Unregister the job. The job ends up `Stopped` even if the engine
    /// refuses the removal.
    pub async fn stop(&mut self, engine: &dyn CronEngine) -> JobResult<()> {
        let previous = std::mem::replace(&mut self.state, JobState::Stopped);
        match previous {
            JobState::Started(key) => engine.remove(key).await,
            JobState::Created | JobState::Stopped => Ok(()),
        }
    }

    /// Run the action once, outside the schedule, behind the same error
    /// boundary as a scheduled tick.
    pub async fn run_now(&self) {
        run_guarded(&self.spec.name, &self.action).await;
    }

    fn tick(&self) -> TickFn {
        let name: Arc<str> = Arc::from(self.spec.name.as_str());
        let action = Arc::clone(&self.action);
        Arc::new(move || -> BoxFuture<()> {
            let name = Arc::clone(&name);
            let action = Arc::clone(&action);
            Box::pin(async move { run_guarded(&name, &action).await })
        })
    }
}

async fn run_guarded(name: &str, action: &JobAction) {
    info!(event = EVENT_JOB, job = %name, "job tick");
    match action().await {
        Ok(()) => ecomode_scaler::ok!(event = EVENT_JOB, job = %name, "job tick complete"),
        Err(e) => error!(event = EVENT_JOB, job = %name, error = %format!("{e:#}"), "job tick failed"),
    }
}

fn parse_time_zone(name: &str) -> JobResult<Tz> {
    name.parse::<Tz>().map_err(|_| {
        warn!(event = EVENT_JOB, time_zone = %name, "unknown time zone");
        JobError::InvalidTimeZone(name.to_string())
    })
}
