//! Domain types exchanged with the control plane.
//!
//! Apps are read-only snapshots fetched fresh every cycle. Formations and
//! operations are transient values scoped to a single scale request.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── App ────────────────────────────────────────────────────────────

/// Lifecycle status reported by the platform for an app.
///
/// Statuses this crate does not know about are kept verbatim in
/// [`AppStatus::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppStatus {
    New,
    Running,
    Stopped,
    Crashed,
    Other(String),
}

impl AppStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AppStatus::New => "new",
            AppStatus::Running => "running",
            AppStatus::Stopped => "stopped",
            AppStatus::Crashed => "crashed",
            AppStatus::Other(s) => s,
        }
    }
}

impl From<String> for AppStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => AppStatus::New,
            "running" => AppStatus::Running,
            "stopped" => AppStatus::Stopped,
            "crashed" => AppStatus::Crashed,
            _ => AppStatus::Other(s),
        }
    }
}

impl From<AppStatus> for String {
    fn from(status: AppStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable unit on the platform. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub status: AppStatus,
}

impl App {
    pub fn new(name: impl Into<String>, status: AppStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

// ── Formation ──────────────────────────────────────────────────────

/// Desired replica count and container size for one process type.
///
/// Serialized with the platform's field names (`name`, `size`, `amount`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerFormation {
    #[serde(rename = "name")]
    pub process_type: String,
    pub size: String,
    #[serde(rename = "amount")]
    pub replicas: u32,
}

impl ContainerFormation {
    /// `web` process on an `S` container, the shape used for review apps.
    pub fn web(replicas: u32) -> Self {
        Self {
            process_type: "web".to_string(),
            size: "S".to_string(),
            replicas,
        }
    }
}

// ── Operation ──────────────────────────────────────────────────────

/// Status of an asynchronous platform operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Done,
    Error,
}

impl OperationStatus {
    /// Map a status string from the API. Anything that is neither `done`
    /// nor `error` (`pending`, `queued`, `running`, …) is still in flight.
    pub fn from_remote(s: &str) -> Self {
        match s {
            "done" => OperationStatus::Done,
            "error" => OperationStatus::Error,
            _ => OperationStatus::Pending,
        }
    }
}

/// Handle on the platform's asynchronous operation for one scale request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// URL the operation status is fetched from.
    pub url: String,
    pub status: OperationStatus,
    /// Error detail reported by the platform when `status` is `Error`.
    pub error: Option<String>,
}

impl Operation {
    /// A freshly submitted operation whose status has not been fetched yet.
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: OperationStatus::Pending,
            error: None,
        }
    }
}

// ── Authentication ─────────────────────────────────────────────────

/// Bearer token obtained from the credential exchange, bound to the API
/// base URL it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub bearer: String,
    pub api_url: String,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("bearer", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}
