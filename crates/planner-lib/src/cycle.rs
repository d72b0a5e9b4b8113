//! Planning cycle and its worker loop
//!
//! A cycle loads the forecast for a window, refreshes the VM catalog,
//! gathers candidate policies, selects one and persists the result. The
//! worker admits one cycle at a time: periodic ticks and forecast
//! notifications are served from a single `select!` loop so two cycles
//! never touch the caches or the stores concurrently.

use crate::catalog::VmCatalog;
use crate::error::SelectionError;
use crate::evaluation::{select_policy, Selection, SelectionConfig};
use crate::health::{components, HealthRegistry};
use crate::models::{Forecast, Policy, ServiceProfile};
use crate::observability::{PlannerMetrics, StructuredLogger};
use crate::profiles::ProfileSource;
use crate::store::{ForecastStore, PolicyStore, StoreError};
use crate::trigger::{ReconfigurationReport, ReconfigurationTrigger};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the forecast notification queue
pub const FORECAST_QUEUE_SIZE: usize = 16;

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Periodic,
    ForecastUpdate,
}

impl CycleTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleTrigger::Periodic => "periodic",
            CycleTrigger::ForecastUpdate => "forecast_update",
        }
    }
}

/// The scaling horizon a cycle plans for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanningWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PlanningWindow {
    pub fn new(start: DateTime<Utc>, size: ChronoDuration) -> Self {
        Self {
            start,
            end: start + size,
        }
    }

    pub fn size(&self) -> ChronoDuration {
        self.end - self.start
    }

    /// The next window of the same size, starting where this one ends
    pub fn advance(&self) -> Self {
        Self::new(self.end, self.size())
    }

    pub fn of_forecast(forecast: &Forecast) -> Self {
        Self {
            start: forecast.time_window_start,
            end: forecast.time_window_end,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("profiles unavailable: {0:#}")]
    Profiles(anyhow::Error),

    #[error("failed to load candidate policies: {0:#}")]
    Candidates(anyhow::Error),
}

impl CycleError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Selection(e) => e.kind(),
            CycleError::Store(_) => "store_error",
            CycleError::Profiles(_) => "profiles_unavailable",
            CycleError::Candidates(_) => "candidates_unavailable",
        }
    }
}

/// Inputs handed to a candidate source
pub struct PlanningContext<'a> {
    pub window: PlanningWindow,
    pub forecast: &'a Forecast,
    pub catalog: &'a VmCatalog,
    pub service: &'a ServiceProfile,
}

/// Where the candidate batch of a cycle comes from
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self, context: &PlanningContext<'_>) -> anyhow::Result<Vec<Policy>>;
}

/// Candidates previously derived for the window and kept in the policy store
pub struct StoredCandidates {
    store: Arc<dyn PolicyStore>,
}

impl StoredCandidates {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateSource for StoredCandidates {
    async fn candidates(&self, context: &PlanningContext<'_>) -> anyhow::Result<Vec<Policy>> {
        Ok(self
            .store
            .find_all_by_time_window(context.window.start, context.window.end)
            .await?)
    }
}

#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub selection: SelectionConfig,
    /// Push the selected policy's transitions to the scheduler
    pub trigger_reconfiguration: bool,
}

/// Result of a successful cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub window: PlanningWindow,
    pub selection: Selection,
    pub reconfiguration: Option<ReconfigurationReport>,
}

/// Collaborators of a planning cycle
pub struct CycleDeps {
    pub policies: Arc<dyn PolicyStore>,
    pub forecasts: Arc<dyn ForecastStore>,
    pub profiles: Arc<dyn ProfileSource>,
    pub candidates: Arc<dyn CandidateSource>,
    pub trigger: Option<ReconfigurationTrigger>,
}

#[derive(Default)]
struct ProfileCache {
    catalog: Option<VmCatalog>,
    service: Option<ServiceProfile>,
}

/// One derive-evaluate-select pass over a window
pub struct PlanningCycle {
    config: CycleConfig,
    deps: CycleDeps,
    cache: RwLock<ProfileCache>,
    health: HealthRegistry,
    metrics: PlannerMetrics,
    logger: StructuredLogger,
}

impl PlanningCycle {
    pub fn new(config: CycleConfig, deps: CycleDeps, health: HealthRegistry) -> Self {
        let logger = StructuredLogger::new(config.selection.main_service_name.clone());
        Self {
            config,
            deps,
            cache: RwLock::new(ProfileCache::default()),
            health,
            metrics: PlannerMetrics::new(),
            logger,
        }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Run a cycle; on error no policy is persisted
    pub async fn run(
        &self,
        trigger: CycleTrigger,
        window: PlanningWindow,
        forecast: Option<Forecast>,
    ) -> Result<CycleOutcome, CycleError> {
        let start = Instant::now();
        self.logger
            .log_cycle_started(trigger.as_str(), window.start, window.end);

        match self.execute(window, forecast).await {
            Ok(outcome) => {
                let policy = &outcome.selection.policy;
                self.metrics.inc_cycle(trigger.as_str(), "selected");
                self.metrics.set_selected_policy_cost(policy.metrics.cost);
                self.logger.log_policy_selected(
                    policy.id,
                    &policy.algorithm,
                    policy.metrics.cost,
                    outcome.selection.others.len() + 1,
                    start.elapsed().as_millis() as u64,
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.inc_cycle(trigger.as_str(), e.kind());
                if let CycleError::Selection(SelectionError::BudgetExceeded {
                    violation_time,
                    cumulative_cost,
                    budget,
                    candidate,
                }) = &e
                {
                    self.metrics.inc_budget_rejections();
                    self.logger.log_budget_exceeded(
                        candidate.id,
                        *budget,
                        *cumulative_cost,
                        *violation_time,
                    );
                }
                self.logger
                    .log_cycle_failed(trigger.as_str(), &e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        window: PlanningWindow,
        forecast: Option<Forecast>,
    ) -> Result<CycleOutcome, CycleError> {
        let forecast = self.load_forecast(window, forecast).await?;
        let (catalog, service) = self.refresh_profiles().await?;

        let context = PlanningContext {
            window,
            forecast: &forecast,
            catalog: &catalog,
            service: &service,
        };
        let batch = self
            .deps
            .candidates
            .candidates(&context)
            .await
            .map_err(CycleError::Candidates)?;
        debug!(candidates = batch.len(), "Loaded candidate policies");
        self.metrics.add_candidates_evaluated(batch.len() as u64);

        let started = Instant::now();
        let selection = select_policy(
            batch,
            &self.config.selection,
            &catalog,
            &forecast.forecasted_values,
        );
        self.metrics
            .observe_selection_latency(started.elapsed().as_secs_f64());
        let selection = selection?;
        self.metrics.record_warnings(&selection.warnings);

        self.persist(window, &selection).await?;

        let reconfiguration = match &self.deps.trigger {
            Some(trigger) if self.config.trigger_reconfiguration => {
                Some(self.reconfigure(trigger, &selection.policy).await)
            }
            _ => None,
        };

        Ok(CycleOutcome {
            window,
            selection,
            reconfiguration,
        })
    }

    async fn load_forecast(
        &self,
        window: PlanningWindow,
        notified: Option<Forecast>,
    ) -> Result<Forecast, CycleError> {
        match notified {
            Some(forecast) => {
                let result = match self
                    .deps
                    .forecasts
                    .update_by_id(forecast.id, forecast.clone())
                    .await
                {
                    Err(e) if e.is_not_found() => {
                        self.deps.forecasts.insert(forecast.clone()).await
                    }
                    other => other,
                };
                self.track_store(result).await?;
                Ok(forecast)
            }
            None => Ok(self
                .deps
                .forecasts
                .find_one_by_time_window(window.start, window.end)
                .await?),
        }
    }

    /// Fetch fresh profiles, falling back to the last good ones
    async fn refresh_profiles(&self) -> Result<(VmCatalog, ServiceProfile), CycleError> {
        let service_name = &self.config.selection.main_service_name;
        let fetched = async {
            let catalog = self.deps.profiles.catalog().await?;
            let service = self.deps.profiles.service_profile(service_name).await?;
            anyhow::Ok((catalog, service))
        }
        .await;

        let mut cache = self.cache.write().await;
        match fetched {
            Ok((catalog, service)) => {
                self.health.set_healthy(components::PROFILES).await;
                cache.catalog = Some(catalog.clone());
                cache.service = Some(service.clone());
                Ok((catalog, service))
            }
            Err(e) => {
                self.metrics.inc_profile_refresh_failures();
                match (&cache.catalog, &cache.service) {
                    (Some(catalog), Some(service)) => {
                        warn!(error = %e, "Profile refresh failed, using cached profiles");
                        self.health
                            .set_degraded(components::PROFILES, format!("using cached profiles: {}", e))
                            .await;
                        Ok((catalog.clone(), service.clone()))
                    }
                    _ => {
                        self.health
                            .set_unhealthy(components::PROFILES, e.to_string())
                            .await;
                        Err(CycleError::Profiles(e))
                    }
                }
            }
        }
    }

    /// Store every evaluated candidate; exactly one policy per window stays selected
    async fn persist(&self, window: PlanningWindow, selection: &Selection) -> Result<(), CycleError> {
        let result = self
            .deps
            .policies
            .save_selection(
                window.start,
                window.end,
                selection.policy.clone(),
                selection.others.clone(),
            )
            .await;
        self.track_store(result).await?;
        self.health.set_healthy(components::POLICY_STORE).await;
        Ok(())
    }

    /// Mark the policy store unhealthy when a write fails
    async fn track_store(&self, result: Result<(), StoreError>) -> Result<(), CycleError> {
        if let Err(e) = &result {
            self.health
                .set_unhealthy(components::POLICY_STORE, e.to_string())
                .await;
        }
        Ok(result?)
    }

    async fn reconfigure(
        &self,
        trigger: &ReconfigurationTrigger,
        policy: &Policy,
    ) -> ReconfigurationReport {
        let report = trigger.apply(policy).await;
        self.logger.log_reconfiguration(&report);
        match &report.failed {
            None => self.health.set_healthy(components::SCHEDULER).await,
            Some(failed) => {
                self.metrics.inc_reconfiguration_failures();
                self.health
                    .set_degraded(components::SCHEDULER, failed.error.clone())
                    .await;
            }
        }
        report
    }
}

/// Serialises planning cycles from the periodic timer and forecast updates
pub struct CycleWorker {
    cycle: Arc<PlanningCycle>,
    window: PlanningWindow,
    period: Duration,
    forecasts: mpsc::Receiver<Forecast>,
}

impl CycleWorker {
    /// Create the worker and the sender used to notify forecast updates
    pub fn new(
        cycle: Arc<PlanningCycle>,
        window: PlanningWindow,
        period: Duration,
    ) -> (Self, mpsc::Sender<Forecast>) {
        let (tx, rx) = mpsc::channel(FORECAST_QUEUE_SIZE);
        let worker = Self {
            cycle,
            window,
            period,
            forecasts: rx,
        };
        (worker, tx)
    }

    /// Window the next periodic cycle plans for
    pub fn window(&self) -> PlanningWindow {
        self.window
    }

    /// Run the periodic cycle; the window only moves on after a success
    pub async fn tick(&mut self) -> Result<CycleOutcome, CycleError> {
        let outcome = self
            .cycle
            .run(CycleTrigger::Periodic, self.window, None)
            .await?;
        self.window = self.window.advance();
        Ok(outcome)
    }

    /// Re-plan the window covered by an updated forecast
    pub async fn handle_forecast(&mut self, forecast: Forecast) -> Result<CycleOutcome, CycleError> {
        let window = PlanningWindow::of_forecast(&forecast);
        self.cycle
            .run(CycleTrigger::ForecastUpdate, window, Some(forecast))
            .await
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_secs = self.period.as_secs(),
            window_start = %self.window.start,
            window_end = %self.window.end,
            "Starting planning worker"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are already logged and counted by the cycle
                    let _ = self.tick().await;
                }
                Some(forecast) = self.forecasts.recv() => {
                    let _ = self.handle_forecast(forecast).await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down planning worker");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{BillingUnit, PricingModel};
    use crate::models::{
        CapacityMetrics, ClusterState, ForecastedValue, PolicyStatus, Pricing, ScalingAction,
        ServiceReplicaState, VmProfile,
    };
    use crate::retry::RetryPolicy;
    use crate::profiles::StaticProfiles;
    use crate::store::{DocumentForecastStore, DocumentPolicyStore};
    use crate::trigger::{SchedulerClient, TriggerError};
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use uuid::Uuid;

    const SERVICE: &str = "web";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn window() -> PlanningWindow {
        PlanningWindow::new(t0(), ChronoDuration::hours(2))
    }

    fn forecast(window: PlanningWindow) -> Forecast {
        Forecast {
            id: Uuid::new_v4(),
            service_name: SERVICE.to_string(),
            time_window_start: window.start,
            time_window_end: window.end,
            forecasted_values: (0..4)
                .map(|i| ForecastedValue {
                    timestamp: window.start + ChronoDuration::minutes(30 * i),
                    requests: 80.0,
                })
                .collect(),
        }
    }

    fn state(vms: u32) -> ClusterState {
        let mut state = ClusterState::default();
        state.vms.insert("small".to_string(), vms);
        state.services.insert(
            SERVICE.to_string(),
            ServiceReplicaState {
                cpu: 0.5,
                memory: 1.0,
                scale: vms,
            },
        );
        state
    }

    /// A single-action candidate running `vms` small VMs for the whole window
    fn candidate(window: PlanningWindow, vms: u32) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            algorithm: format!("fixed-{}", vms),
            scaling_actions: vec![ScalingAction {
                time_start: window.start,
                time_end: window.end,
                time_start_transition: window.start,
                initial_state: ClusterState::default(),
                desired_state: state(vms),
                capacity: CapacityMetrics {
                    requests_capacity: 100.0 * vms as f64,
                },
                metrics: Default::default(),
            }],
            parameters: BTreeMap::new(),
            metrics: Default::default(),
            status: PolicyStatus::Candidate,
            time_window_start: window.start,
            time_window_end: window.end,
        }
    }

    fn profiles() -> StaticProfiles {
        StaticProfiles::new(
            vec![VmProfile {
                vm_type: "small".to_string(),
                cpu_cores: 2.0,
                memory_gb: 4.0,
                pricing: Pricing { price: 1.0 },
            }],
            vec![ServiceProfile {
                service_name: SERVICE.to_string(),
                cpu_per_replica: 0.5,
                memory_per_replica: 1.0,
                max_requests_per_replica: 100.0,
            }],
        )
    }

    /// Profile source that can be switched off mid-test
    struct FlakyProfiles {
        inner: StaticProfiles,
        down: AtomicBool,
    }

    #[async_trait]
    impl ProfileSource for FlakyProfiles {
        async fn vm_profiles(&self) -> anyhow::Result<Vec<VmProfile>> {
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("profiler unreachable");
            }
            self.inner.vm_profiles().await
        }

        async fn service_profile(&self, name: &str) -> anyhow::Result<ServiceProfile> {
            self.inner.service_profile(name).await
        }
    }

    #[derive(Default)]
    struct CountingScheduler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchedulerClient for CountingScheduler {
        async fn apply_state(
            &self,
            _time: DateTime<Utc>,
            _state: &ClusterState,
        ) -> Result<(), TriggerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        policies: Arc<DocumentPolicyStore>,
        forecasts: Arc<DocumentForecastStore>,
        health: HealthRegistry,
        cycle: Arc<PlanningCycle>,
    }

    fn harness(budget: f64, profiles: Arc<dyn ProfileSource>, trigger: Option<ReconfigurationTrigger>) -> Harness {
        let policies = Arc::new(DocumentPolicyStore::in_memory(SERVICE));
        harness_with(policies, budget, profiles, trigger)
    }

    fn harness_with(
        policies: Arc<DocumentPolicyStore>,
        budget: f64,
        profiles: Arc<dyn ProfileSource>,
        trigger: Option<ReconfigurationTrigger>,
    ) -> Harness {
        let forecasts = Arc::new(DocumentForecastStore::in_memory());
        let health = HealthRegistry::new();
        let config = CycleConfig {
            selection: SelectionConfig {
                main_service_name: SERVICE.to_string(),
                pricing: PricingModel {
                    budget,
                    billing_unit: BillingUnit::Hour,
                },
            },
            trigger_reconfiguration: trigger.is_some(),
        };
        let deps = CycleDeps {
            policies: policies.clone(),
            forecasts: forecasts.clone(),
            profiles,
            candidates: Arc::new(StoredCandidates::new(policies.clone())),
            trigger,
        };
        let cycle = Arc::new(PlanningCycle::new(config, deps, health.clone()));
        Harness {
            policies,
            forecasts,
            health,
            cycle,
        }
    }

    async fn seed(h: &Harness, window: PlanningWindow, sizes: &[u32]) -> Vec<Uuid> {
        h.forecasts.insert(forecast(window)).await.unwrap();
        let mut ids = Vec::new();
        for &vms in sizes {
            let p = candidate(window, vms);
            ids.push(p.id);
            h.policies.insert(p).await.unwrap();
        }
        ids
    }

    #[test]
    fn test_window_advances_by_its_size() {
        let next = window().advance();
        assert_eq!(next.start, t0() + ChronoDuration::hours(2));
        assert_eq!(next.end, t0() + ChronoDuration::hours(4));
    }

    #[tokio::test]
    async fn test_cycle_selects_cheapest_and_persists_all() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        let ids = seed(&h, window(), &[3, 1, 2]).await;

        let outcome = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();

        assert_eq!(outcome.selection.policy.id, ids[1]);
        assert_eq!(outcome.selection.others.len(), 2);
        assert!(outcome.reconfiguration.is_none());

        let stored = h
            .policies
            .find_all_by_time_window(window().start, window().end)
            .await
            .unwrap();
        assert_eq!(stored.iter().filter(|p| p.is_selected()).count(), 1);
        assert!(stored.iter().all(|p| p.metrics.cost > 0.0));

        let selected = h
            .policies
            .find_selected_by_time_window(window().start, window().end)
            .await
            .unwrap();
        assert_eq!(selected.id, ids[1]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_selection() {
        let dir = tempfile::TempDir::new().unwrap();
        let policies = Arc::new(
            DocumentPolicyStore::open(dir.path(), SERVICE, &RetryPolicy::none())
                .await
                .unwrap(),
        );
        let h = harness_with(policies, f64::MAX, Arc::new(profiles()), None);
        h.forecasts.insert(forecast(window())).await.unwrap();

        let mut previous = candidate(window(), 3);
        previous.status = PolicyStatus::Selected;
        h.policies.insert(previous.clone()).await.unwrap();
        let cheaper = candidate(window(), 1);
        h.policies.insert(cheaper.clone()).await.unwrap();

        // A directory at the temp path makes the next flush fail
        std::fs::create_dir(dir.path().join(format!("policies_{}.tmp", SERVICE))).unwrap();

        let err = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store_error");
        assert_eq!(
            h.health.status(components::POLICY_STORE).await,
            Some(crate::health::ComponentStatus::Unhealthy)
        );

        let selected = h
            .policies
            .find_selected_by_time_window(window().start, window().end)
            .await
            .unwrap();
        assert_eq!(selected.id, previous.id);
        let untouched = h.policies.find_by_id(cheaper.id).await.unwrap();
        assert!(!untouched.is_selected());
        assert_eq!(untouched.metrics.cost, 0.0);

        let reopened = DocumentPolicyStore::open(dir.path(), SERVICE, &RetryPolicy::none())
            .await
            .unwrap();
        let on_disk = reopened
            .find_selected_by_time_window(window().start, window().end)
            .await
            .unwrap();
        assert_eq!(on_disk.id, previous.id);
    }

    #[tokio::test]
    async fn test_budget_rejection_persists_nothing() {
        let h = harness(0.5, Arc::new(profiles()), None);
        seed(&h, window(), &[1, 2]).await;

        let err = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "budget_exceeded");
        let stored = h.policies.find_all().await.unwrap();
        assert!(stored.iter().all(|p| !p.is_selected()));
        assert!(stored.iter().all(|p| p.metrics.cost == 0.0));
    }

    #[tokio::test]
    async fn test_empty_batch_is_no_suitable_policy() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        seed(&h, window(), &[]).await;

        let err = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CycleError::Selection(SelectionError::NoSuitablePolicy)
        ));
    }

    #[tokio::test]
    async fn test_missing_forecast_is_store_error() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);

        let err = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store_error");
    }

    #[tokio::test]
    async fn test_reselection_keeps_one_selected() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        let ids = seed(&h, window(), &[2, 3]).await;
        h.cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();

        let cheaper = candidate(window(), 1);
        h.policies.insert(cheaper.clone()).await.unwrap();
        let outcome = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();

        assert_eq!(outcome.selection.policy.id, cheaper.id);
        let stored = h.policies.find_all().await.unwrap();
        let selected: Vec<_> = stored.iter().filter(|p| p.is_selected()).collect();
        assert_eq!(selected.len(), 1);
        assert_ne!(selected[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_profile_outage_uses_cache_and_degrades() {
        let flaky = Arc::new(FlakyProfiles {
            inner: profiles(),
            down: AtomicBool::new(false),
        });
        let h = harness(f64::MAX, flaky.clone(), None);
        seed(&h, window(), &[1]).await;

        h.cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();
        flaky.down.store(true, Ordering::SeqCst);
        h.cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();

        assert_eq!(
            h.health.status(components::PROFILES).await,
            Some(crate::health::ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_profile_outage_without_cache_fails() {
        let flaky = Arc::new(FlakyProfiles {
            inner: profiles(),
            down: AtomicBool::new(true),
        });
        let h = harness(f64::MAX, flaky, None);
        seed(&h, window(), &[1]).await;

        let err = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "profiles_unavailable");
    }

    #[tokio::test]
    async fn test_trigger_receives_selected_transitions() {
        let scheduler = Arc::new(CountingScheduler::default());
        let trigger = ReconfigurationTrigger::new(scheduler.clone());
        let h = harness(f64::MAX, Arc::new(profiles()), Some(trigger));
        seed(&h, window(), &[1, 2]).await;

        let outcome = h
            .cycle
            .run(CycleTrigger::Periodic, window(), None)
            .await
            .unwrap();

        let report = outcome.reconfiguration.unwrap();
        assert!(report.is_complete());
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_advances_only_after_success() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        let (mut worker, _tx) =
            CycleWorker::new(h.cycle.clone(), window(), Duration::from_secs(3600));

        assert!(worker.tick().await.is_err());
        assert_eq!(worker.window(), window());

        seed(&h, window(), &[1]).await;
        worker.tick().await.unwrap();
        assert_eq!(worker.window(), window().advance());
    }

    #[tokio::test]
    async fn test_forecast_update_persists_and_replans() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        let later = window().advance();
        h.policies.insert(candidate(later, 1)).await.unwrap();
        let (mut worker, _tx) =
            CycleWorker::new(h.cycle.clone(), window(), Duration::from_secs(3600));

        let update = forecast(later);
        let outcome = worker.handle_forecast(update.clone()).await.unwrap();

        assert_eq!(outcome.window, later);
        assert_eq!(worker.window(), window());
        assert_eq!(h.forecasts.find_by_id(update.id).await.unwrap().id, update.id);
    }

    #[tokio::test]
    async fn test_worker_loop_serves_notifications_until_shutdown() {
        let h = harness(f64::MAX, Arc::new(profiles()), None);
        let later = window().advance();
        h.policies.insert(candidate(later, 1)).await.unwrap();
        let (worker, tx) =
            CycleWorker::new(h.cycle.clone(), window(), Duration::from_secs(3600));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(worker.run(shutdown_rx));
        tx.send(forecast(later)).await.unwrap();

        let mut selected = None;
        for _ in 0..100 {
            if let Ok(p) = h
                .policies
                .find_selected_by_time_window(later.start, later.end)
                .await
            {
                selected = Some(p);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(selected.is_some());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
