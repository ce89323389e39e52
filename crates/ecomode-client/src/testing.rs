//! Scripted in-memory control plane for tests.
//!
//! Records every call (with the tokio clock, so paused-time tests can
//! assert spacing) and replays per-app scripts of operation statuses.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::client::ControlPlane;
use crate::error::{ClientError, ClientResult};
use crate::types::{App, AuthToken, ContainerFormation, Operation, OperationStatus};

const OPERATION_PREFIX: &str = "fake://operations/";

/// A scale request as seen by the fake.
#[derive(Debug, Clone)]
pub struct ScaleCall {
    pub app: String,
    pub formation: Vec<ContainerFormation>,
    pub token: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
enum ScaleScript {
    Fail { status: u16, message: String },
    NoOperation,
}

#[derive(Default)]
struct FakeState {
    apps: Vec<App>,
    auth_error: Option<String>,
    list_error: Option<(u16, String)>,
    auth_calls: usize,
    list_calls: usize,
    scale_scripts: HashMap<String, ScaleScript>,
    operation_scripts: HashMap<String, VecDeque<OperationStatus>>,
    scale_calls: Vec<ScaleCall>,
    scale_latency: Duration,
    scales_in_flight: usize,
    max_scales_in_flight: usize,
    refresh_failures: HashMap<String, usize>,
    refresh_calls: HashMap<String, usize>,
}

/// In-memory [`ControlPlane`] with scripted responses.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apps returned by `list_apps`, in order.
    pub fn with_apps(self, apps: Vec<App>) -> Self {
        self.lock().apps = apps;
        self
    }

    /// Make every `authenticate` call fail.
    pub fn failing_auth(self, message: &str) -> Self {
        self.lock().auth_error = Some(message.to_string());
        self
    }

    /// Make `list_apps` fail with an API error.
    pub fn failing_list(self, status: u16, message: &str) -> Self {
        self.lock().list_error = Some((status, message.to_string()));
        self
    }

    /// Make the scale submission for `app` fail with an API error.
    pub fn failing_scale(self, app: &str, status: u16, message: &str) -> Self {
        self.lock().scale_scripts.insert(
            app.to_string(),
            ScaleScript::Fail {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Accept the scale submission for `app` without an operation handle.
    pub fn scale_without_operation(self, app: &str) -> Self {
        self.lock()
            .scale_scripts
            .insert(app.to_string(), ScaleScript::NoOperation);
        self
    }

    /// Make every scale submission take `latency` to be answered.
    pub fn with_scale_latency(self, latency: Duration) -> Self {
        self.lock().scale_latency = latency;
        self
    }

    /// Fail the next `count` refreshes of `app`'s operation with a 503.
    pub fn failing_refreshes(self, app: &str, count: usize) -> Self {
        self.lock().refresh_failures.insert(app.to_string(), count);
        self
    }

    /// Statuses returned by successive refreshes of `app`'s operation.
    /// The last status repeats once the script is exhausted; apps without
    /// a script report `done` on the first refresh.
    pub fn with_operation_script(
        self,
        app: &str,
        statuses: impl IntoIterator<Item = OperationStatus>,
    ) -> Self {
        self.lock()
            .operation_scripts
            .insert(app.to_string(), statuses.into_iter().collect());
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.lock().auth_calls
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn scale_calls(&self) -> Vec<ScaleCall> {
        self.lock().scale_calls.clone()
    }

    pub fn scaled_apps(&self) -> Vec<String> {
        self.lock()
            .scale_calls
            .iter()
            .map(|c| c.app.clone())
            .collect()
    }

    /// Highest number of scale submissions awaiting an answer at once.
    pub fn max_scales_in_flight(&self) -> usize {
        self.lock().max_scales_in_flight
    }

    pub fn refresh_calls(&self, app: &str) -> usize {
        self.lock().refresh_calls.get(app).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn authenticate(&self, _credential: &str, api_url: &str) -> ClientResult<AuthToken> {
        let mut state = self.lock();
        state.auth_calls += 1;
        if let Some(message) = &state.auth_error {
            return Err(ClientError::Auth(message.clone()));
        }
        Ok(AuthToken {
            bearer: format!("token-{}", state.auth_calls),
            api_url: api_url.to_string(),
        })
    }

    async fn list_apps(&self, _token: &AuthToken) -> ClientResult<Vec<App>> {
        let mut state = self.lock();
        state.list_calls += 1;
        if let Some((status, message)) = &state.list_error {
            return Err(ClientError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(state.apps.clone())
    }

    async fn scale(
        &self,
        token: &AuthToken,
        app: &str,
        formation: &[ContainerFormation],
    ) -> ClientResult<Option<Operation>> {
        let latency = {
            let mut state = self.lock();
            state.scale_calls.push(ScaleCall {
                app: app.to_string(),
                formation: formation.to_vec(),
                token: token.bearer.clone(),
                at: Instant::now(),
            });
            state.scales_in_flight += 1;
            state.max_scales_in_flight = state.max_scales_in_flight.max(state.scales_in_flight);
            state.scale_latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.scales_in_flight -= 1;
        match state.scale_scripts.get(app) {
            Some(ScaleScript::Fail { status, message }) => Err(ClientError::Api {
                status: *status,
                message: message.clone(),
            }),
            Some(ScaleScript::NoOperation) => Ok(None),
            None => Ok(Some(Operation::pending(format!("{OPERATION_PREFIX}{app}")))),
        }
    }

    async fn refresh(&self, _token: &AuthToken, operation: &Operation) -> ClientResult<Operation> {
        let app = operation
            .url
            .strip_prefix(OPERATION_PREFIX)
            .ok_or_else(|| ClientError::Decode(format!("unknown operation {}", operation.url)))?
            .to_string();

        let mut state = self.lock();
        *state.refresh_calls.entry(app.clone()).or_default() += 1;

        if let Some(left) = state.refresh_failures.get_mut(&app) {
            if *left > 0 {
                *left -= 1;
                return Err(ClientError::Api {
                    status: 503,
                    message: "operation status unavailable".to_string(),
                });
            }
        }

        let status = match state.operation_scripts.get_mut(&app) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(OperationStatus::Done),
            Some(script) => script.front().copied().unwrap_or(OperationStatus::Done),
            None => OperationStatus::Done,
        };

        Ok(Operation {
            url: operation.url.clone(),
            status,
            error: (status == OperationStatus::Error)
                .then(|| format!("container web-1 of {app} failed to scale")),
        })
    }
}
