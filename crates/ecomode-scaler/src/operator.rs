//! Scaling operator — one scale request, polled to a terminal status.
//!
//! Only genuine submission failures are returned as errors. Benign answers
//! (unchanged formation, app not ready), failed operations and exhausted
//! polls are logged and reported through [`ScaleReport`]; the next scheduled
//! cycle picks those apps up again.
//!
//! A scale runs in two steps: [`ScalingOperator::submit`] sends the request
//! and sorts the answer, [`ScalingOperator::complete`] follows the platform
//! operation if one was started. [`ScalingOperator::scale`] chains both.
//!
//! Dropping a `scale` future mid-poll is safe: nothing is written locally
//! and the platform finishes or fails the operation on its own.

use std::sync::Arc;

use tracing::{debug, error, warn};

use ecomode_client::{App, ContainerFormation, ControlPlane, Operation, OperationStatus};

use crate::config::PollConfig;
use crate::error::{ScaleError, ScaleResult};
use crate::logging::EVENT_SCALE;
use crate::outcome::{classify, ScaleOutcome};
use crate::session::SessionManager;

/// How a single app's scale ended, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleReport {
    /// The platform applied the new formation.
    Scaled,
    /// The app already had the requested formation.
    Unchanged,
    /// The app could not be scaled yet.
    NotReady,
    /// The operation ended in error, or its status could not be read.
    OperationFailed,
    /// The operation was still pending when the poll budget ran out.
    PollExhausted,
}

/// A scale request the platform has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing left to wait for.
    Settled(ScaleReport),
    /// Accepted, with an operation to follow.
    Accepted(Operation),
}

/// Terminal state of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done { checks: u32 },
    Failed { checks: u32, detail: String },
    Exhausted { checks: u32 },
}

/// Submits scale requests and follows their operations.
pub struct ScalingOperator {
    client: Arc<dyn ControlPlane>,
    sessions: Arc<SessionManager>,
    poll: PollConfig,
}

impl ScalingOperator {
    pub fn new(client: Arc<dyn ControlPlane>, sessions: Arc<SessionManager>, poll: PollConfig) -> Self {
        Self {
            client,
            sessions,
            poll,
        }
    }

    /// Scale `app` to `formation` and wait for the platform to settle.
    pub async fn scale(&self, app: &App, formation: &[ContainerFormation]) -> ScaleResult<ScaleReport> {
        let submission = self.submit(app, formation).await?;
        Ok(self.complete(&app.name, submission).await)
    }

    /// Send the scale request and classify the answer. Returns once the
    /// platform has answered, without following the operation.
    pub async fn submit(&self, app: &App, formation: &[ContainerFormation]) -> ScaleResult<Submission> {
        let session = self.sessions.get_session().await?;
        let replicas: u32 = formation.iter().map(|f| f.replicas).sum();
        debug!(event = EVENT_SCALE, app = %app.name, replicas, "scaling app");

        let submitted = self
            .client
            .scale(session.token(), &app.name, formation)
            .await;

        match classify(submitted) {
            ScaleOutcome::BenignNoop => {
                warn!(event = EVENT_SCALE, app = %app.name, "app not scaled due to unchanged formation");
                Ok(Submission::Settled(ScaleReport::Unchanged))
            }
            ScaleOutcome::BenignNotReady(detail) => {
                warn!(
                    event = EVENT_SCALE,
                    app = %app.name,
                    error = %detail,
                    "app not ready to be scaled, retrying next cycle"
                );
                Ok(Submission::Settled(ScaleReport::NotReady))
            }
            ScaleOutcome::Fatal(detail) => {
                error!(event = EVENT_SCALE, app = %app.name, error = %detail, "scale request failed");
                Err(ScaleError::Submission {
                    app: app.name.clone(),
                    detail,
                })
            }
            ScaleOutcome::Success(None) => {
                crate::ok!(event = EVENT_SCALE, app = %app.name, replicas, "app scaled successfully");
                Ok(Submission::Settled(ScaleReport::Scaled))
            }
            ScaleOutcome::Success(Some(operation)) => Ok(Submission::Accepted(operation)),
        }
    }

    /// Follow an accepted submission to its end.
    pub async fn complete(&self, app: &str, submission: Submission) -> ScaleReport {
        let operation = match submission {
            Submission::Settled(report) => return report,
            Submission::Accepted(operation) => operation,
        };

        match self.await_operation(app, operation).await {
            PollOutcome::Done { checks } => {
                crate::ok!(event = EVENT_SCALE, %app, checks, "app scaled successfully");
                ScaleReport::Scaled
            }
            PollOutcome::Failed { .. } => ScaleReport::OperationFailed,
            PollOutcome::Exhausted { .. } => ScaleReport::PollExhausted,
        }
    }

    /// Poll `operation` until it is done, errored, or the attempt budget is
    /// spent. A status read that fails uses up one attempt. Every failure
    /// is logged here and absorbed.
    pub async fn await_operation(&self, app: &str, operation: Operation) -> PollOutcome {
        let mut operation = operation;
        let mut attempts: u32 = 0;
        let mut checks: u32 = 0;

        loop {
            let session = match self.sessions.get_session().await {
                Ok(session) => session,
                Err(e) => {
                    error!(event = EVENT_SCALE, %app, error = %e, "lost session while polling scale operation");
                    return PollOutcome::Failed {
                        checks,
                        detail: e.to_string(),
                    };
                }
            };

            let refreshed = self.client.refresh(session.token(), &operation).await;
            checks += 1;

            match refreshed {
                Ok(op) => operation = op,
                Err(e) if attempts >= self.poll.max_attempts => {
                    error!(
                        event = EVENT_SCALE,
                        %app,
                        status = ?e.status(),
                        error = %e,
                        "failed to read scale operation status"
                    );
                    return PollOutcome::Failed {
                        checks,
                        detail: e.to_string(),
                    };
                }
                Err(e) => {
                    warn!(
                        event = EVENT_SCALE,
                        %app,
                        status = ?e.status(),
                        error = %e,
                        attempts,
                        "scale operation status unavailable"
                    );
                    attempts += 1;
                    tokio::time::sleep(self.poll.interval).await;
                    continue;
                }
            }

            match operation.status {
                OperationStatus::Done => return PollOutcome::Done { checks },
                OperationStatus::Error => {
                    let detail = operation
                        .error
                        .take()
                        .unwrap_or_else(|| "operation ended in error".to_string());
                    error!(event = EVENT_SCALE, %app, error = %detail, "scale operation failed");
                    return PollOutcome::Failed { checks, detail };
                }
                OperationStatus::Pending if attempts >= self.poll.max_attempts => {
                    error!(
                        event = EVENT_SCALE,
                        %app,
                        max_attempts = self.poll.max_attempts,
                        "scale operation exceeded max attempts"
                    );
                    return PollOutcome::Exhausted { checks };
                }
                OperationStatus::Pending => {
                    attempts += 1;
                    debug!(event = EVENT_SCALE, %app, attempts, "scale operation pending");
                    tokio::time::sleep(self.poll.interval).await;
                }
            }
        }
    }
}
