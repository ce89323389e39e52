//! ecomode-scaler — scale review apps down at night and back up in the morning.
//!
//! Everything here runs once per scheduled cycle and keeps no state between
//! cycles except the cached control-plane session.
//!
//! # Architecture
//!
//! ```text
//! ReviewAppOrchestrator
//!   ├── FleetSelector      (marker match, ignore set, status filter)
//!   ├── ScalingOperator    (submit → classify → poll to terminal status)
//!   ├── RestartThrottler   (SubmissionPacer spaces answered submissions)
//!   └── SessionManager     (bearer token cached for one hour)
//! ```
//!
//! # Poll protocol
//!
//! ```text
//! check status
//!   done       → scaled
//!   error      → logged, absorbed
//!   unreadable → attempts == max ? failed (logged, absorbed)
//!                                : attempts += 1, sleep(interval), check again
//!   pending    → attempts == max ? exhausted (logged, absorbed)
//!                                : attempts += 1, sleep(interval), check again
//! ```
//!
//! One initial check plus at most `max_attempts` re-checks are made, so a
//! permanently pending operation is fetched `max_attempts + 1` times.

pub mod config;
pub mod error;
pub mod fleet;
pub mod logging;
pub mod operator;
pub mod orchestrator;
pub mod outcome;
pub mod session;
pub mod throttle;

pub use config::{PollConfig, ScalerConfig};
pub use error::{ScaleError, ScaleResult};
pub use fleet::FleetSelector;
pub use operator::{PollOutcome, ScaleReport, ScalingOperator, Submission};
pub use orchestrator::{CycleReport, ReviewAppOrchestrator};
pub use outcome::{classify, ScaleOutcome};
pub use session::{Session, SessionManager};
pub use throttle::{PendingScale, RestartThrottler, SubmissionPacer};
