//! Job error types.

use thiserror::Error;

/// Errors raised while building or (un)registering jobs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid time zone: {0}")]
    InvalidTimeZone(String),

    #[error("invalid schedule {schedule:?} for job {job}: {detail}")]
    InvalidSchedule {
        job: String,
        schedule: String,
        detail: String,
    },

    #[error("cron engine error: {0}")]
    Engine(String),
}

pub type JobResult<T> = Result<T, JobError>;
