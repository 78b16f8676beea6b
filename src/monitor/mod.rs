//! Health monitor
//!
//! Periodic background job that reclassifies every service's operational
//! state from elapsed time since its last status refresh, persists the
//! refreshed rows in one batch and raises an alert on each transition
//! into Down.
//!
//! The store is a trait so the sweep can be unit-tested against an
//! in-memory fake; production wires in `db::CatalogService`.

use crate::error::AppError;
use crate::models::{HealthState, Service, ServiceStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Elapsed minutes after which a service is considered degraded.
pub const DEGRADED_AFTER_MINUTES: i64 = 5;

/// Elapsed minutes after which a service is considered down.
pub const DOWN_AFTER_MINUTES: i64 = 10;

/// Classify a service from the elapsed time since its last status
/// refresh. No timestamp at all means the service has never reported.
pub fn classify(last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> HealthState {
    let Some(last_updated) = last_updated else {
        return HealthState::Unknown;
    };

    let elapsed = now - last_updated;
    if elapsed > Duration::minutes(DOWN_AFTER_MINUTES) {
        HealthState::Down
    } else if elapsed > Duration::minutes(DEGRADED_AFTER_MINUTES) {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

/// One refreshed status row, keyed by service id (rows are upserted).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub service_id: i32,
    pub status: HealthState,
    pub last_updated: DateTime<Utc>,
}

/// Store surface the monitor needs. The batch save must be atomic.
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn list_services(&self) -> Result<Vec<Service>, AppError>;
    async fn load_status(&self, service_id: i32) -> Result<Option<ServiceStatus>, AppError>;
    async fn save_statuses(&self, updates: &[StatusUpdate]) -> Result<(), AppError>;
}

/// Side-effect invoked on each transition into Down.
pub trait Alerter: Send + Sync {
    fn alert(&self, service: &Service);
}

/// Default alerter: logs at WARN. Notification channels (email, Slack)
/// plug in behind the same trait.
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, service: &Service) {
        warn!(
            service_id = service.id,
            service_name = %service.name,
            "ALERT: service is down"
        );
    }
}

/// Counters from one sweep, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Services successfully classified this sweep
    pub checked: usize,
    /// Services whose classified state differs from the stored one
    pub transitions: usize,
    /// Alerts raised (transitions into Down)
    pub alerts: usize,
}

/// The periodic health check task.
pub struct HealthMonitor<S> {
    store: S,
    alerter: Arc<dyn Alerter>,
    interval: std::time::Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S: HealthStore> HealthMonitor<S> {
    pub fn new(
        store: S,
        alerter: Arc<dyn Alerter>,
        interval: std::time::Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            alerter,
            interval,
            shutdown,
        }
    }

    /// Run the periodic loop until shutdown is signalled.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick resolves immediately; consume it so the first
        // sweep happens one full period after startup.
        ticker.tick().await;

        info!(interval_secs = self.interval.as_secs(), "health monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once(Utc::now()).await {
                        Ok(summary) => info!(
                            checked = summary.checked,
                            transitions = summary.transitions,
                            alerts = summary.alerts,
                            "health check sweep complete"
                        ),
                        // The job has no caller to report to; log and
                        // wait for the next tick.
                        Err(e) => error!("health check sweep failed: {}", e),
                    }
                }
                changed = self.shutdown.changed() => {
                    // A closed channel means the server is gone too
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("health monitor stopped");
    }

    /// One sweep over all services.
    ///
    /// Every processed service gets `last_updated` refreshed to `now`,
    /// re-arming the elapsed-time clock. A read failure for one service
    /// is logged and skipped; the batch save covers the rest.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepSummary, AppError> {
        let services = self.store.list_services().await?;

        let mut summary = SweepSummary::default();
        let mut updates = Vec::with_capacity(services.len());

        for service in &services {
            if *self.shutdown.borrow() {
                break;
            }

            let status = match self.store.load_status(service.id).await {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        service_id = service.id,
                        "skipping service in health sweep: {}", e
                    );
                    continue;
                }
            };

            let previous = status.as_ref().map(|s| s.status);
            let next = classify(status.as_ref().and_then(|s| s.last_updated), now);

            if previous != Some(next) {
                summary.transitions += 1;
            }

            // Alert exactly once, on the transition into Down
            if next == HealthState::Down && previous != Some(HealthState::Down) {
                self.alerter.alert(service);
                summary.alerts += 1;
            }

            summary.checked += 1;
            updates.push(StatusUpdate {
                service_id: service.id,
                status: next,
                last_updated: now,
            });
        }

        if !updates.is_empty() {
            self.store.save_statuses(&updates).await?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn service(id: i32, name: &str) -> Service {
        Service {
            id,
            name: name.to_string(),
            description: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    /// In-memory stand-in for the catalog store.
    struct FakeStore {
        services: Vec<Service>,
        statuses: Mutex<HashMap<i32, ServiceStatus>>,
        fail_load_for: Option<i32>,
    }

    impl FakeStore {
        fn new(services: Vec<Service>) -> Self {
            Self {
                services,
                statuses: Mutex::new(HashMap::new()),
                fail_load_for: None,
            }
        }

        fn with_status(self, service_id: i32, status: HealthState, last_updated: DateTime<Utc>) -> Self {
            self.statuses.lock().unwrap().insert(
                service_id,
                ServiceStatus {
                    id: service_id,
                    service_id,
                    status,
                    last_updated: Some(last_updated),
                },
            );
            self
        }

        fn status_of(&self, service_id: i32) -> Option<ServiceStatus> {
            self.statuses.lock().unwrap().get(&service_id).cloned()
        }
    }

    #[async_trait]
    impl HealthStore for &FakeStore {
        async fn list_services(&self) -> Result<Vec<Service>, AppError> {
            Ok(self.services.clone())
        }

        async fn load_status(&self, service_id: i32) -> Result<Option<ServiceStatus>, AppError> {
            if self.fail_load_for == Some(service_id) {
                return Err(AppError::Internal("injected failure".to_string()));
            }
            Ok(self.status_of(service_id))
        }

        async fn save_statuses(&self, updates: &[StatusUpdate]) -> Result<(), AppError> {
            let mut statuses = self.statuses.lock().unwrap();
            for update in updates {
                statuses.insert(
                    update.service_id,
                    ServiceStatus {
                        id: update.service_id,
                        service_id: update.service_id,
                        status: update.status,
                        last_updated: Some(update.last_updated),
                    },
                );
            }
            Ok(())
        }
    }

    struct CountingAlerter {
        fired: AtomicUsize,
    }

    impl CountingAlerter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fired: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.fired.load(Ordering::SeqCst)
        }
    }

    impl Alerter for CountingAlerter {
        fn alert(&self, _service: &Service) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn monitor<'a>(
        store: &'a FakeStore,
        alerter: Arc<dyn Alerter>,
    ) -> HealthMonitor<&'a FakeStore> {
        let (_tx, rx) = watch::channel(false);
        HealthMonitor::new(store, alerter, std::time::Duration::from_secs(60), rx)
    }

    #[test]
    fn classify_thresholds() {
        let now = Utc::now();
        assert_eq!(classify(None, now), HealthState::Unknown);
        assert_eq!(
            classify(Some(now - Duration::minutes(1)), now),
            HealthState::Healthy
        );
        assert_eq!(
            classify(Some(now - Duration::minutes(5)), now),
            HealthState::Healthy
        );
        assert_eq!(
            classify(Some(now - Duration::minutes(6)), now),
            HealthState::Degraded
        );
        assert_eq!(
            classify(Some(now - Duration::minutes(10)), now),
            HealthState::Degraded
        );
        assert_eq!(
            classify(Some(now - Duration::minutes(11)), now),
            HealthState::Down
        );
    }

    #[tokio::test]
    async fn missing_status_row_becomes_unknown() {
        let store = FakeStore::new(vec![service(1, "api")]);
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let now = Utc::now();
        let summary = m.run_once(now).await.unwrap();

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.transitions, 1);
        assert_eq!(alerter.count(), 0);

        let status = store.status_of(1).unwrap();
        assert_eq!(status.status, HealthState::Unknown);
        assert_eq!(status.last_updated, Some(now));
    }

    #[tokio::test]
    async fn stale_service_transitions_to_down_with_one_alert() {
        let now = Utc::now();
        let store = FakeStore::new(vec![service(1, "api")]).with_status(
            1,
            HealthState::Healthy,
            now - Duration::minutes(15),
        );
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let summary = m.run_once(now).await.unwrap();
        assert_eq!(summary.alerts, 1);
        assert_eq!(store.status_of(1).unwrap().status, HealthState::Down);

        // One full period later the re-armed clock has run out again:
        // still Down, but no second alert.
        let later = now + Duration::minutes(15);
        let summary = m.run_once(later).await.unwrap();
        assert_eq!(summary.alerts, 0);
        assert_eq!(summary.transitions, 0);
        assert_eq!(store.status_of(1).unwrap().status, HealthState::Down);
        assert_eq!(alerter.count(), 1);
    }

    #[tokio::test]
    async fn healthy_service_stays_healthy_and_clock_rearms() {
        let now = Utc::now();
        let store = FakeStore::new(vec![service(1, "api")]).with_status(
            1,
            HealthState::Healthy,
            now - Duration::minutes(1),
        );
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let first = m.run_once(now).await.unwrap();
        assert_eq!(first.transitions, 0);
        assert_eq!(store.status_of(1).unwrap().last_updated, Some(now));

        let moment_later = now + Duration::seconds(30);
        let second = m.run_once(moment_later).await.unwrap();
        assert_eq!(second.transitions, 0);

        let status = store.status_of(1).unwrap();
        assert_eq!(status.status, HealthState::Healthy);
        assert_eq!(status.last_updated, Some(moment_later));
        assert_eq!(alerter.count(), 0);
    }

    #[tokio::test]
    async fn unknown_service_with_stale_timestamp_alerts_on_down() {
        let now = Utc::now();
        let store = FakeStore::new(vec![service(1, "api")]).with_status(
            1,
            HealthState::Unknown,
            now - Duration::minutes(20),
        );
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let summary = m.run_once(now).await.unwrap();
        assert_eq!(summary.alerts, 1);
        assert_eq!(store.status_of(1).unwrap().status, HealthState::Down);
    }

    #[tokio::test]
    async fn read_failure_for_one_service_does_not_abort_the_sweep() {
        let now = Utc::now();
        let mut store = FakeStore::new(vec![
            service(1, "api"),
            service(2, "worker"),
            service(3, "frontend"),
        ]);
        store.fail_load_for = Some(2);
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let summary = m.run_once(now).await.unwrap();
        assert_eq!(summary.checked, 2);
        assert!(store.status_of(1).is_some());
        assert!(store.status_of(2).is_none());
        assert!(store.status_of(3).is_some());
    }

    #[tokio::test]
    async fn degraded_band_is_between_five_and_ten_minutes() {
        let now = Utc::now();
        let store = FakeStore::new(vec![service(1, "api")]).with_status(
            1,
            HealthState::Healthy,
            now - Duration::minutes(7),
        );
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let summary = m.run_once(now).await.unwrap();
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.alerts, 0);
        assert_eq!(store.status_of(1).unwrap().status, HealthState::Degraded);
    }

    #[tokio::test]
    async fn empty_catalog_performs_no_write() {
        let store = FakeStore::new(Vec::new());
        let alerter = CountingAlerter::new();
        let m = monitor(&store, alerter.clone());

        let summary = m.run_once(Utc::now()).await.unwrap();
        assert_eq!(summary, SweepSummary::default());
        assert!(store.statuses.lock().unwrap().is_empty());
    }
}
