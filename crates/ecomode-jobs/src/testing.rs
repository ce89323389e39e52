//! A cron engine that only fires when told to.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::engine::{CronEngine, JobKey, JobSpec, TickFn};
use crate::error::{JobError, JobResult};

struct Registration {
    key: JobKey,
    spec: JobSpec,
    tick: TickFn,
}

/// In-memory [`CronEngine`]. Registrations are kept in insertion order and
/// [`ManualCronEngine::fire`] runs a tick to completion on the caller's task.
#[derive(Default)]
pub struct ManualCronEngine {
    registrations: Mutex<Vec<Registration>>,
    failing: HashSet<String>,
}

impl ManualCronEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to register the job called `name`.
    pub fn failing_for(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.spec.name.clone()).collect()
    }

    pub fn registered_specs(&self) -> Vec<JobSpec> {
        self.lock().iter().map(|r| r.spec.clone()).collect()
    }

    /// Fire every registration named `name` once. Returns `false` when no
    /// such job is registered.
    pub async fn fire(&self, name: &str) -> bool {
        let ticks: Vec<TickFn> = self
            .lock()
            .iter()
            .filter(|r| r.spec.name == name)
            .map(|r| r.tick.clone())
            .collect();
        for tick in &ticks {
            tick().await;
        }
        !ticks.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CronEngine for ManualCronEngine {
    async fn add(&self, spec: &JobSpec, tick: TickFn) -> JobResult<JobKey> {
        if self.failing.contains(&spec.name) {
            return Err(JobError::Engine(format!("cannot register {}", spec.name)));
        }
        let key = Uuid::new_v4();
        self.lock().push(Registration {
            key,
            spec: spec.clone(),
            tick,
        });
        Ok(key)
    }

    async fn remove(&self, key: JobKey) -> JobResult<()> {
        let mut registrations = self.lock();
        let before = registrations.len();
        registrations.retain(|r| r.key != key);
        if registrations.len() == before {
            return Err(JobError::Engine(format!("unknown job {key}")));
        }
        Ok(())
    }
}
