//! ecomode-jobs — recurring stop and restart cycles.
//!
//! A [`JobManager`] owns two [`Job`]s, one per fleet action, and binds them
//! to cron expressions through a [`CronEngine`]. The engine is injected so
//! tests can fire ticks by hand; the daemon uses [`TokioCronEngine`].
//!
//! # Job lifecycle
//!
//! ```text
//! Created ──start──▶ Started ──stop──▶ Stopped
//!                       ▲                 │
//!                       └──────start──────┘
//! ```
//!
//! Each tick runs behind an error boundary: a failed cycle is logged and
//! the next scheduled tick fires normally. Ticks are never retried, queued
//! or coalesced.

pub mod eco;
pub mod engine;
pub mod error;
pub mod job;
pub mod manager;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use eco::EcoModeManager;
pub use engine::{CronEngine, JobKey, JobSpec, TickFn, TokioCronEngine};
pub use error::{JobError, JobResult};
pub use job::{Job, JobAction, JobState};
pub use manager::{FleetActions, JobManager, JobSchedule};
