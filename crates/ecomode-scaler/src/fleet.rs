//! Fleet selector — which apps a cycle acts on.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error};

use ecomode_client::{App, AppStatus, ControlPlane};

use crate::error::{ScaleError, ScaleResult};
use crate::logging::EVENT_FLEET;
use crate::session::SessionManager;

/// Lists review apps from the control plane, minus the ignore set.
pub struct FleetSelector {
    client: Arc<dyn ControlPlane>,
    sessions: Arc<SessionManager>,
    marker: String,
    ignored: HashSet<String>,
}

impl FleetSelector {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        sessions: Arc<SessionManager>,
        marker: impl Into<String>,
        ignored: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client,
            sessions,
            marker: marker.into(),
            ignored: ignored.into_iter().collect(),
        }
    }

    /// Fetch the fleet and keep the review apps worth acting on.
    ///
    /// The result keeps the platform's listing order.
    pub async fn list_candidate_units(
        &self,
        status_filter: Option<&[AppStatus]>,
    ) -> ScaleResult<Vec<App>> {
        let session = self.sessions.get_session().await?;
        let apps = self.client.list_apps(session.token()).await.map_err(|e| {
            error!(event = EVENT_FLEET, error = %e, "failed to list apps");
            ScaleError::Fleet(e)
        })?;

        let total = apps.len();
        let candidates = select_candidates(apps, &self.marker, &self.ignored, status_filter);
        debug!(event = EVENT_FLEET, total, candidates = candidates.len(), "fleet selected");
        Ok(candidates)
    }
}

/// Keep apps whose name contains `marker`, that are not ignored, and whose
/// status is in `status_filter` when one is given.
pub fn select_candidates(
    apps: Vec<App>,
    marker: &str,
    ignored: &HashSet<String>,
    status_filter: Option<&[AppStatus]>,
) -> Vec<App> {
    apps.into_iter()
        .filter(|app| app.name.contains(marker))
        .filter(|app| !ignored.contains(&app.name))
        .filter(|app| status_filter.is_none_or(|statuses| statuses.contains(&app.status)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecomode_client::testing::FakeControlPlane;

    use crate::logging::capture::CapturedLogs;

    fn fleet() -> Vec<App> {
        vec![
            App::new("new-app-review-pr-1", AppStatus::New),
            App::new("running-app-review-pr-2", AppStatus::Running),
            App::new("stopped-app-review-pr-3", AppStatus::Stopped),
            App::new("not-review-app", AppStatus::Running),
            App::new("crashed-app-review-pr-4", AppStatus::Crashed),
        ]
    }

    fn names(apps: &[App]) -> Vec<&str> {
        apps.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn keeps_only_marked_apps_in_fetch_order() {
        let selected = select_candidates(fleet(), "-review-pr", &HashSet::new(), None);
        assert_eq!(
            names(&selected),
            vec![
                "new-app-review-pr-1",
                "running-app-review-pr-2",
                "stopped-app-review-pr-3",
                "crashed-app-review-pr-4",
            ]
        );
    }

    #[test]
    fn drops_ignored_apps() {
        let ignored: HashSet<String> = ["running-app-review-pr-2".to_string()].into();
        let selected = select_candidates(fleet(), "-review-pr", &ignored, None);
        assert!(!names(&selected).contains(&"running-app-review-pr-2"));
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn status_filter_keeps_matching_statuses() {
        let selected = select_candidates(
            fleet(),
            "-review-pr",
            &HashSet::new(),
            Some(&[AppStatus::New, AppStatus::Running][..]),
        );
        assert_eq!(
            names(&selected),
            vec!["new-app-review-pr-1", "running-app-review-pr-2"]
        );
    }

    #[test]
    fn unknown_statuses_never_match_a_filter() {
        let apps = vec![App::new("x-review-pr-9", AppStatus::Other("restarting".to_string()))];
        let selected = select_candidates(
            apps,
            "-review-pr",
            &HashSet::new(),
            Some(&[AppStatus::New, AppStatus::Running][..]),
        );
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn list_candidate_units_goes_through_the_session() {
        let fake = Arc::new(FakeControlPlane::new().with_apps(fleet()));
        let sessions = Arc::new(SessionManager::new(fake.clone(), "tk", "https://api.example"));
        let selector = FleetSelector::new(
            fake.clone(),
            sessions,
            "-review-pr",
            vec!["new-app-review-pr-1".to_string()],
        );

        let selected = selector.list_candidate_units(None).await.unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(fake.auth_calls(), 1);
        assert_eq!(fake.list_calls(), 1);
    }

    #[tokio::test]
    async fn listing_failure_is_a_fleet_error() {
        let fake = Arc::new(FakeControlPlane::new().failing_list(503, "maintenance"));
        let sessions = Arc::new(SessionManager::new(fake.clone(), "tk", "https://api.example"));
        let selector = FleetSelector::new(fake, sessions, "-review-pr", Vec::new());

        let err = selector.list_candidate_units(None).await.unwrap_err();
        assert!(matches!(err, ScaleError::Fleet(_)));
    }

    #[tokio::test]
    async fn listing_records_carry_the_fleet_event() {
        let (logs, _guard) = CapturedLogs::install();
        let fake = Arc::new(FakeControlPlane::new().with_apps(fleet()));
        let sessions = Arc::new(SessionManager::new(fake.clone(), "tk", "https://api.example"));
        let selector = FleetSelector::new(fake, sessions, "-review-pr", Vec::new());
        selector.list_candidate_units(None).await.unwrap();

        let failing = Arc::new(FakeControlPlane::new().failing_list(503, "maintenance"));
        let sessions = Arc::new(SessionManager::new(failing.clone(), "tk", "https://api.example"));
        let selector = FleetSelector::new(failing, sessions, "-review-pr", Vec::new());
        selector.list_candidate_units(None).await.unwrap_err();

        let selected = logs.with_message("fleet selected");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0]["fields"]["event"], EVENT_FLEET);
        assert_eq!(selected[0]["fields"]["candidates"], 4);

        let failed = logs.with_message("failed to list apps");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["level"], "ERROR");
        assert_eq!(failed[0]["fields"]["event"], EVENT_FLEET);
    }
}
