//! Observability infrastructure for the scaling planner
//!
//! Provides:
//! - Prometheus metrics (selection latency, cycles, budget rejections, data warnings)
//! - Structured JSON logging with tracing

use crate::evaluation::EvaluationWarning;
use crate::trigger::ReconfigurationReport;
use chrono::{DateTime, Utc};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Gauge,
    Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Histogram buckets for selection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PlannerMetricsInner> = OnceLock::new();

struct PlannerMetricsInner {
    selection_latency_seconds: Histogram,
    cycles_total: IntCounterVec,
    candidates_evaluated: IntCounter,
    budget_rejections: IntCounter,
    data_warnings: IntCounterVec,
    selected_policy_cost: Gauge,
    reconfiguration_failures: IntCounter,
    profile_refresh_failures: IntCounter,
    forecast_notifications: IntCounterVec,
}

impl PlannerMetricsInner {
    fn new() -> Self {
        Self {
            selection_latency_seconds: register_histogram!(
                "scaling_planner_selection_latency_seconds",
                "Time spent evaluating and selecting among candidate policies",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register selection_latency_seconds"),

            cycles_total: register_int_counter_vec!(
                "scaling_planner_cycles_total",
                "Planning cycles by trigger and outcome",
                &["trigger", "outcome"]
            )
            .expect("Failed to register cycles_total"),

            candidates_evaluated: register_int_counter!(
                "scaling_planner_candidates_evaluated_total",
                "Total number of candidate policies scored"
            )
            .expect("Failed to register candidates_evaluated"),

            budget_rejections: register_int_counter!(
                "scaling_planner_budget_rejections_total",
                "Selections rejected because the best candidate exceeded the budget"
            )
            .expect("Failed to register budget_rejections"),

            data_warnings: register_int_counter_vec!(
                "scaling_planner_data_warnings_total",
                "Data integrity warnings raised while scoring policies",
                &["kind"]
            )
            .expect("Failed to register data_warnings"),

            selected_policy_cost: register_gauge!(
                "scaling_planner_selected_policy_cost",
                "Total cost of the most recently selected policy"
            )
            .expect("Failed to register selected_policy_cost"),

            reconfiguration_failures: register_int_counter!(
                "scaling_planner_reconfiguration_failures_total",
                "Scheduler transitions that failed to apply"
            )
            .expect("Failed to register reconfiguration_failures"),

            profile_refresh_failures: register_int_counter!(
                "scaling_planner_profile_refresh_failures_total",
                "Failed attempts to refresh VM or service profiles"
            )
            .expect("Failed to register profile_refresh_failures"),

            forecast_notifications: register_int_counter_vec!(
                "scaling_planner_forecast_notifications_total",
                "Forecast update notifications received over the API, by outcome",
                &["outcome"]
            )
            .expect("Failed to register forecast_notifications"),
        }
    }
}

/// Planner metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PlannerMetrics {
    _private: (),
}

impl Default for PlannerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PlannerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PlannerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_selection_latency(&self, duration_secs: f64) {
        self.inner().selection_latency_seconds.observe(duration_secs);
    }

    /// Count a finished cycle; `outcome` is "selected" or an error kind
    pub fn inc_cycle(&self, trigger: &str, outcome: &str) {
        self.inner()
            .cycles_total
            .with_label_values(&[trigger, outcome])
            .inc();
    }

    pub fn add_candidates_evaluated(&self, count: u64) {
        self.inner().candidates_evaluated.inc_by(count);
    }

    pub fn inc_budget_rejections(&self) {
        self.inner().budget_rejections.inc();
    }

    pub fn record_warnings(&self, warnings: &[EvaluationWarning]) {
        for w in warnings {
            self.inner()
                .data_warnings
                .with_label_values(&[w.warning.kind()])
                .inc();
        }
    }

    pub fn set_selected_policy_cost(&self, cost: f64) {
        self.inner().selected_policy_cost.set(cost);
    }

    pub fn inc_reconfiguration_failures(&self) {
        self.inner().reconfiguration_failures.inc();
    }

    pub fn inc_profile_refresh_failures(&self) {
        self.inner().profile_refresh_failures.inc();
    }

    /// Count a forecast notification: "queued", "dropped" or "rejected"
    pub fn inc_forecast_notification(&self, outcome: &str) {
        self.inner()
            .forecast_notifications
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Structured logger for planner events
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn log_cycle_started(
        &self,
        trigger: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) {
        info!(
            event = "cycle_started",
            service = %self.service_name,
            trigger = %trigger,
            window_start = %window_start,
            window_end = %window_end,
            "Planning cycle started"
        );
    }

    pub fn log_policy_selected(
        &self,
        policy_id: Uuid,
        algorithm: &str,
        cost: f64,
        candidates: usize,
        duration_ms: u64,
    ) {
        info!(
            event = "policy_selected",
            service = %self.service_name,
            policy_id = %policy_id,
            algorithm = %algorithm,
            cost = cost,
            candidates = candidates,
            duration_ms = duration_ms,
            "Scaling policy selected"
        );
    }

    pub fn log_budget_exceeded(
        &self,
        policy_id: Uuid,
        budget: f64,
        cumulative_cost: f64,
        violation_time: DateTime<Utc>,
    ) {
        warn!(
            event = "budget_exceeded",
            service = %self.service_name,
            policy_id = %policy_id,
            budget = budget,
            cumulative_cost = cumulative_cost,
            violation_time = %violation_time,
            "Budget is not enough for the time window, increase it to ensure resources"
        );
    }

    pub fn log_cycle_failed(&self, trigger: &str, reason: &str) {
        error!(
            event = "cycle_failed",
            service = %self.service_name,
            trigger = %trigger,
            reason = %reason,
            "Planning cycle failed, result discarded"
        );
    }

    pub fn log_reconfiguration(&self, report: &ReconfigurationReport) {
        match &report.failed {
            None => info!(
                event = "reconfiguration_applied",
                service = %self.service_name,
                policy_id = %report.policy_id,
                transitions = report.succeeded.len(),
                "Policy transitions applied"
            ),
            Some(failed) => warn!(
                event = "reconfiguration_incomplete",
                service = %self.service_name,
                policy_id = %report.policy_id,
                succeeded = report.succeeded.len(),
                failed_index = failed.action_index,
                pending = report.pending.len(),
                error = %failed.error,
                "Reconfiguration stopped at failed transition"
            ),
        }
    }

    pub fn log_startup(&self, version: &str, listen_addr: &str) {
        info!(
            event = "planner_started",
            service = %self.service_name,
            planner_version = %version,
            listen_addr = %listen_addr,
            "Scaling planner started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "planner_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Scaling planner shutting down"
        );
    }
}
