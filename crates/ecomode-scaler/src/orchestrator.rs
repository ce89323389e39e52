//! Review app orchestrator — the two fleet-wide operations.
//!
//! `stop_all_review_apps` scales every active review app to zero, all at
//! once. `restart_all_review_apps` brings every review app back to one web
//! container, with submissions paced by the [`RestartThrottler`].
//!
//! Per-app failures are logged and counted at this boundary; only failures
//! that prevent the cycle from starting (authentication, listing) are
//! returned to the caller.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info};

use ecomode_client::{App, AppStatus, ContainerFormation, ControlPlane};

use crate::config::ScalerConfig;
use crate::error::{ScaleError, ScaleResult};
use crate::fleet::FleetSelector;
use crate::logging::{EVENT_RESTART, EVENT_STOP};
use crate::operator::{ScaleReport, ScalingOperator};
use crate::session::SessionManager;
use crate::throttle::RestartThrottler;

/// Statuses of apps that are worth stopping.
pub const STOPPABLE_STATUSES: [AppStatus; 2] = [AppStatus::New, AppStatus::Running];

/// Tally of one stop or restart cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub scaled: usize,
    pub unchanged: usize,
    pub not_ready: usize,
    pub operation_failed: usize,
    pub poll_exhausted: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(candidates: usize) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    fn record(&mut self, event: &'static str, app: &str, result: ScaleResult<ScaleReport>) {
        match result {
            Ok(ScaleReport::Scaled) => self.scaled += 1,
            Ok(ScaleReport::Unchanged) => self.unchanged += 1,
            Ok(ScaleReport::NotReady) => self.not_ready += 1,
            Ok(ScaleReport::OperationFailed) => self.operation_failed += 1,
            Ok(ScaleReport::PollExhausted) => self.poll_exhausted += 1,
            Err(e) => {
                error!(%event, %app, error = %e, "review app scale failed");
                self.failed += 1;
            }
        }
    }
}

/// Wires session, fleet selection, scaling and throttling together.
pub struct ReviewAppOrchestrator {
    fleet: FleetSelector,
    operator: Arc<ScalingOperator>,
    throttler: RestartThrottler,
}

impl ReviewAppOrchestrator {
    pub fn new(client: Arc<dyn ControlPlane>, config: ScalerConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&client),
            config.credential,
            config.api_url,
        ));
        let fleet = FleetSelector::new(
            Arc::clone(&client),
            Arc::clone(&sessions),
            config.name_marker,
            config.ignored_apps,
        );
        let operator = Arc::new(ScalingOperator::new(client, sessions, config.poll));
        let throttler = RestartThrottler::new(Arc::clone(&operator), config.restart_delay);

        Self {
            fleet,
            operator,
            throttler,
        }
    }

    /// Scale every `new` or `running` review app to zero, concurrently.
    pub async fn stop_all_review_apps(&self) -> ScaleResult<CycleReport> {
        let apps = self
            .fleet
            .list_candidate_units(Some(&STOPPABLE_STATUSES[..]))
            .await?;
        info!(event = EVENT_STOP, count = apps.len(), "stopping review apps");

        let formation = [ContainerFormation::web(0)];
        let results = join_all(apps.iter().map(|app| self.operator.scale(app, &formation))).await;

        let mut report = CycleReport::new(apps.len());
        for (app, result) in apps.iter().zip(results) {
            report.record(EVENT_STOP, &app.name, result);
        }
        log_summary(EVENT_STOP, &report);
        Ok(report)
    }

    /// Scale every review app to one web container, one submission at a
    /// time.
    pub async fn restart_all_review_apps(&self) -> ScaleResult<CycleReport> {
        let apps: Vec<App> = self.fleet.list_candidate_units(None).await?;
        info!(event = EVENT_RESTART, count = apps.len(), "restarting review apps");

        let mut report = CycleReport::new(apps.len());
        let pending = self
            .throttler
            .restart_all(apps, vec![ContainerFormation::web(1)])
            .await;

        for scale in pending {
            let result = scale.handle.await.unwrap_or_else(|e| {
                Err(ScaleError::Task {
                    app: scale.app.clone(),
                    detail: e.to_string(),
                })
            });
            report.record(EVENT_RESTART, &scale.app, result);
        }
        log_summary(EVENT_RESTART, &report);
        Ok(report)
    }
}

fn log_summary(event: &'static str, report: &CycleReport) {
    let summary = crate::logging::render_message(report);
    if report.failed == 0 {
        crate::ok!(%event, %summary, "cycle complete");
    } else {
        error!(%event, %summary, failed = report.failed, "cycle complete with failures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ecomode_client::testing::FakeControlPlane;

    use crate::outcome::NO_CHANGE_MESSAGE;

    fn orchestrator(fake: &Arc<FakeControlPlane>, ignored: &[&str]) -> ReviewAppOrchestrator {
        let config = ScalerConfig::new("tk", "https://api.example")
            .with_ignored_apps(ignored.iter().map(|s| s.to_string()).collect())
            .with_restart_delay(Duration::from_millis(3000));
        ReviewAppOrchestrator::new(fake.clone(), config)
    }

    #[tokio::test]
    async fn stop_only_targets_active_review_apps() {
        let fake = Arc::new(FakeControlPlane::new().with_apps(vec![
            App::new("a-review-pr-1", AppStatus::Running),
            App::new("b-review-pr-2", AppStatus::Stopped),
            App::new("c-other", AppStatus::Running),
        ]));

        let report = orchestrator(&fake, &[]).stop_all_review_apps().await.unwrap();

        let calls = fake.scale_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].app, "a-review-pr-1");
        assert_eq!(calls[0].formation, vec![ContainerFormation::web(0)]);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.scaled, 1);
    }

    #[tokio::test]
    async fn stop_skips_ignored_apps() {
        let fake = Arc::new(
            FakeControlPlane::new().with_apps(vec![App::new("ignored-review-pr-1", AppStatus::New)]),
        );

        let report = orchestrator(&fake, &["ignored-review-pr-1"])
            .stop_all_review_apps()
            .await
            .unwrap();

        assert!(fake.scale_calls().is_empty());
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn stop_failure_of_one_app_does_not_affect_siblings() {
        let fake = Arc::new(
            FakeControlPlane::new()
                .with_apps(vec![
                    App::new("a-review-pr-1", AppStatus::Running),
                    App::new("b-review-pr-2", AppStatus::New),
                    App::new("c-review-pr-3", AppStatus::Running),
                ])
                .failing_scale("a-review-pr-1", 500, "internal error")
                .failing_scale("c-review-pr-3", 422, NO_CHANGE_MESSAGE),
        );

        let report = orchestrator(&fake, &[]).stop_all_review_apps().await.unwrap();

        assert_eq!(fake.scale_calls().len(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.scaled, 1);
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_targets_every_review_app_regardless_of_status() {
        let fake = Arc::new(FakeControlPlane::new().with_apps(vec![
            App::new("stopped-app-review-pr-1", AppStatus::Stopped),
            App::new("crashed-app-review-pr-2", AppStatus::Crashed),
            App::new("not-review-app", AppStatus::Running),
        ]));

        let report = orchestrator(&fake, &[]).restart_all_review_apps().await.unwrap();

        assert_eq!(
            fake.scaled_apps(),
            vec!["stopped-app-review-pr-1", "crashed-app-review-pr-2"]
        );
        assert!(fake
            .scale_calls()
            .iter()
            .all(|c| c.formation == vec![ContainerFormation::web(1)]));
        assert_eq!(report.scaled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_failure_is_counted_not_returned() {
        let fake = Arc::new(
            FakeControlPlane::new()
                .with_apps(vec![
                    App::new("a-review-pr-1", AppStatus::Stopped),
                    App::new("b-review-pr-2", AppStatus::Stopped),
                ])
                .failing_scale("a-review-pr-1", 503, "unavailable"),
        );

        let report = orchestrator(&fake, &[]).restart_all_review_apps().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.scaled, 1);
    }

    #[tokio::test]
    async fn authentication_failure_aborts_the_cycle() {
        let fake = Arc::new(
            FakeControlPlane::new()
                .with_apps(vec![App::new("a-review-pr-1", AppStatus::Running)])
                .failing_auth("invalid token"),
        );

        let err = orchestrator(&fake, &[]).stop_all_review_apps().await.unwrap_err();
        assert!(matches!(err, ScaleError::Session(_)));
        assert!(fake.scale_calls().is_empty());
    }

    #[test]
    fn cycle_report_serializes_to_flat_object() {
        let report = CycleReport {
            candidates: 2,
            scaled: 2,
            ..CycleReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["candidates"], 2);
        assert_eq!(json["failed"], 0);
    }
}
