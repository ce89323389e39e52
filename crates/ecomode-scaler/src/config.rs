//! Scaler settings.

use std::time::Duration;

/// Naming convention that marks an app as a review app.
pub const REVIEW_APP_MARKER: &str = "-review-pr";

/// Bounded polling of a scale operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between two status checks.
    pub interval: Duration,
    /// Re-checks allowed after the initial one.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 10,
        }
    }
}

/// Everything the orchestrator needs to reach and scale the fleet.
#[derive(Debug, Clone)]
pub struct ScalerConfig {
    pub credential: String,
    pub api_url: String,
    /// App names never scaled.
    pub ignored_apps: Vec<String>,
    pub name_marker: String,
    pub poll: PollConfig,
    /// Spacing between two scale-up submissions.
    pub restart_delay: Duration,
}

impl ScalerConfig {
    pub fn new(credential: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            api_url: api_url.into(),
            ignored_apps: Vec::new(),
            name_marker: REVIEW_APP_MARKER.to_string(),
            poll: PollConfig::default(),
            restart_delay: Duration::from_millis(3000),
        }
    }

    pub fn with_ignored_apps(mut self, ignored: Vec<String>) -> Self {
        self.ignored_apps = ignored;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }
}
