//! Restart throttling — scale-up submissions spaced by a fixed delay.
//!
//! Submissions are paced, their polls are not: each submission is awaited
//! until the platform answers, then its operation is followed in its own
//! task while the next submission waits out the delay. Polls overlap,
//! submissions never do.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use ecomode_client::{App, ContainerFormation};

use crate::error::ScaleResult;
use crate::logging::EVENT_RESTART;
use crate::operator::{ScaleReport, ScalingOperator};

/// Keeps submissions at least `delay` apart, measured from the moment the
/// previous submission was answered.
///
/// Driven by the tokio clock, so tests can run it under paused time.
#[derive(Debug)]
pub struct SubmissionPacer {
    delay: Duration,
    next_slot: Option<Instant>,
}

impl SubmissionPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: None,
        }
    }

    /// Wait until the next submission may go out. The first one is
    /// immediate.
    pub async fn acquire(&mut self) {
        if let Some(next) = self.next_slot {
            tokio::time::sleep_until(next).await;
        }
    }

    /// Record that a submission has just been answered.
    pub fn submitted(&mut self) {
        self.next_slot = Some(Instant::now() + self.delay);
    }

    /// Wait out the delay that follows the last submission.
    pub async fn settle(&mut self) {
        if let Some(next) = self.next_slot {
            tokio::time::sleep_until(next).await;
        }
    }
}

/// A submitted scale whose completion has not been awaited yet.
#[derive(Debug)]
pub struct PendingScale {
    pub app: String,
    pub handle: JoinHandle<ScaleResult<ScaleReport>>,
}

/// Submits scale requests for a fleet one at a time.
pub struct RestartThrottler {
    operator: Arc<ScalingOperator>,
    delay: Duration,
}

impl RestartThrottler {
    pub fn new(operator: Arc<ScalingOperator>, delay: Duration) -> Self {
        Self { operator, delay }
    }

    /// Submit a scale for each app in order, `delay` apart, and return the
    /// handles of the scales still being followed. The delay also follows
    /// the last submission before this returns.
    pub async fn restart_all(&self, apps: Vec<App>, formation: Vec<ContainerFormation>) -> Vec<PendingScale> {
        let mut pacer = SubmissionPacer::new(self.delay);
        let mut pending = Vec::with_capacity(apps.len());

        for app in apps {
            pacer.acquire().await;
            debug!(event = EVENT_RESTART, app = %app.name, "submitting throttled scale");

            let submission = self.operator.submit(&app, &formation).await;
            pacer.submitted();

            let operator = Arc::clone(&self.operator);
            let name = app.name;
            let handle = {
                let name = name.clone();
                tokio::spawn(async move {
                    match submission {
                        Ok(submission) => Ok(operator.complete(&name, submission).await),
                        Err(e) => Err(e),
                    }
                })
            };
            pending.push(PendingScale { app: name, handle });
        }

        pacer.settle().await;
        pending
    }
}
