//! Daemon configuration: TOML file, then flags and environment on top.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Args;
use serde::{Deserialize, Serialize};

use ecomode_client::scalingo::DEFAULT_AUTH_URL;
use ecomode_jobs::manager::{DEFAULT_RESTART_CRON, DEFAULT_STOP_CRON};
use ecomode_jobs::JobSchedule;
use ecomode_scaler::config::REVIEW_APP_MARKER;
use ecomode_scaler::{PollConfig, ScalerConfig};

/// Top-level `ecomode.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EcoModeConfig {
    pub scalingo: ScalingoConfig,
    pub review_apps: ReviewAppsConfig,
    pub schedule: ScheduleConfig,
    pub scaling: ScalingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalingoConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub auth_url: String,
}

impl Default for ScalingoConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewAppsConfig {
    /// Substring that marks an app as a review app.
    pub marker: String,
    /// Apps left alone by both cycles.
    pub ignored: Vec<String>,
}

impl Default for ReviewAppsConfig {
    fn default() -> Self {
        Self {
            marker: REVIEW_APP_MARKER.to_string(),
            ignored: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub stop_cron: String,
    pub restart_cron: String,
    pub time_zone: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            stop_cron: DEFAULT_STOP_CRON.to_string(),
            restart_cron: DEFAULT_RESTART_CRON.to_string(),
            time_zone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub restart_delay_ms: u64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            poll_max_attempts: 10,
            restart_delay_ms: 3000,
        }
    }
}

/// Settings given on the command line or through the environment. Each
/// one wins over the file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Scalingo API token exchanged for a bearer token.
    #[arg(long, env = "SCALINGO_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Regional API base URL, e.g. https://api.osc-fr1.scalingo.com.
    #[arg(long, env = "SCALINGO_API_URL", global = true)]
    pub api_url: Option<String>,

    #[arg(long, env = "SCALINGO_AUTH_URL", global = true)]
    pub auth_url: Option<String>,

    /// Comma-separated app names never scaled.
    #[arg(long, env = "IGNORED_REVIEW_APPS", global = true)]
    pub ignored_apps: Option<String>,

    #[arg(long, env = "STOP_CRON_TIME", global = true)]
    pub stop_cron: Option<String>,

    #[arg(long, env = "RESTART_CRON_TIME", global = true)]
    pub restart_cron: Option<String>,

    /// IANA time zone of both schedules, e.g. Europe/Paris.
    #[arg(long, env = "TIME_ZONE", global = true)]
    pub time_zone: Option<String>,

    #[arg(long, env = "POLL_INTERVAL_MS", global = true)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, env = "POLL_MAX_ATTEMPTS", global = true)]
    pub poll_max_attempts: Option<u32>,

    #[arg(long, env = "RESTART_DELAY_MS", global = true)]
    pub restart_delay_ms: Option<u64>,
}

impl EcoModeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: EcoModeConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Read the optional file, apply overrides and validate the result.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        let o = overrides.clone();
        if o.token.is_some() {
            self.scalingo.token = o.token;
        }
        if o.api_url.is_some() {
            self.scalingo.api_url = o.api_url;
        }
        if let Some(auth_url) = o.auth_url {
            self.scalingo.auth_url = auth_url;
        }
        if let Some(ignored) = o.ignored_apps {
            self.review_apps.ignored = parse_ignore_list(&ignored);
        }
        if let Some(stop_cron) = o.stop_cron {
            self.schedule.stop_cron = stop_cron;
        }
        if let Some(restart_cron) = o.restart_cron {
            self.schedule.restart_cron = restart_cron;
        }
        if o.time_zone.is_some() {
            self.schedule.time_zone = o.time_zone;
        }
        if let Some(ms) = o.poll_interval_ms {
            self.scaling.poll_interval_ms = ms;
        }
        if let Some(attempts) = o.poll_max_attempts {
            self.scaling.poll_max_attempts = attempts;
        }
        if let Some(ms) = o.restart_delay_ms {
            self.scaling.restart_delay_ms = ms;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.credential().is_none() {
            bail!("missing Scalingo API token (set SCALINGO_TOKEN or [scalingo] token)");
        }
        if self.api_url().is_none() {
            bail!("missing Scalingo API URL (set SCALINGO_API_URL or [scalingo] api_url)");
        }
        if let Some(tz) = &self.schedule.time_zone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                bail!("invalid time zone: {tz}");
            }
        }
        Ok(())
    }

    pub fn scaler_config(&self) -> anyhow::Result<ScalerConfig> {
        let (Some(credential), Some(api_url)) = (self.credential(), self.api_url()) else {
            bail!("Scalingo API token and URL are required");
        };
        let mut config = ScalerConfig::new(credential, api_url)
            .with_ignored_apps(self.review_apps.ignored.clone())
            .with_poll(PollConfig {
                interval: Duration::from_millis(self.scaling.poll_interval_ms),
                max_attempts: self.scaling.poll_max_attempts,
            })
            .with_restart_delay(Duration::from_millis(self.scaling.restart_delay_ms));
        config.name_marker = self.review_apps.marker.clone();
        Ok(config)
    }

    pub fn job_schedule(&self) -> JobSchedule {
        JobSchedule {
            stop_cron: self.schedule.stop_cron.clone(),
            restart_cron: self.schedule.restart_cron.clone(),
            time_zone: self.schedule.time_zone.clone(),
        }
    }

    fn credential(&self) -> Option<&str> {
        non_empty(self.scalingo.token.as_deref())
    }

    fn api_url(&self) -> Option<&str> {
        non_empty(self.scalingo.api_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Split a comma-separated list of app names, dropping blanks.
pub fn parse_ignore_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
