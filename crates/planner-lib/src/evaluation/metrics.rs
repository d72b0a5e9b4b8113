//! Per-action and per-policy metrics
//!
//! A single forward pass walks the scaling actions and the forecast
//! together. The forecast cursor only ever moves forward, so each sample is
//! attributed to at most one action of the policy.

use super::pricing::round_to;
use super::warnings::{DataIntegrityWarning, Resource};
use super::SelectionConfig;
use crate::catalog::VmCatalog;
use crate::models::{ConfigMetrics, ForecastedValue, PolicyMetrics, ScalingAction};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Result of scoring one policy's scaling actions
#[derive(Debug, Clone, Default)]
pub struct MetricsReport {
    pub metrics: PolicyMetrics,
    /// Every VM type placed in a desired state
    pub vm_types: BTreeSet<String>,
    pub warnings: Vec<DataIntegrityWarning>,
}

/// Position in the forecast shared by all actions of a policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForecastCursor {
    position: usize,
}

/// Over/under-provision samples attributed to one action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionWindow {
    over_sum: f64,
    over_samples: u32,
    under_sum: f64,
    under_samples: u32,
    pub consumed: usize,
    pub zero_demand: Vec<DateTime<Utc>>,
}

impl ProvisionWindow {
    fn add(mut self, sample: &ForecastedValue, capacity: f64) -> Self {
        self.consumed += 1;
        if sample.requests <= 0.0 {
            self.zero_demand.push(sample.timestamp);
            return self;
        }
        let delta = capacity - sample.requests;
        if delta > 0.0 {
            self.over_sum += delta * 100.0 / sample.requests;
            self.over_samples += 1;
        } else if delta < 0.0 {
            self.under_sum += -delta * 100.0 / sample.requests;
            self.under_samples += 1;
        }
        self
    }

    /// Mean over-provision percentage, 0 without samples
    pub fn over_provision(&self) -> f64 {
        mean(self.over_sum, self.over_samples)
    }

    /// Mean under-provision percentage, 0 without samples
    pub fn under_provision(&self) -> f64 {
        mean(self.under_sum, self.under_samples)
    }
}

fn mean(sum: f64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl ForecastCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Consume the samples strictly before `until` and fold them into a
    /// provision window for an action offering `capacity` requests.
    pub fn advance(
        &mut self,
        forecast: &[ForecastedValue],
        until: DateTime<Utc>,
        capacity: f64,
    ) -> ProvisionWindow {
        let window = forecast
            .get(self.position..)
            .unwrap_or_default()
            .iter()
            .take_while(|sample| sample.timestamp < until)
            .fold(ProvisionWindow::default(), |w, sample| w.add(sample, capacity));
        self.position += window.consumed;
        window
    }
}

/// Compute the metrics of every scaling action and aggregate them into the
/// policy metrics. Each action's `metrics` is overwritten.
pub fn compute_policy_metrics(
    actions: &mut [ScalingAction],
    forecast: &[ForecastedValue],
    config: &SelectionConfig,
    catalog: &VmCatalog,
) -> MetricsReport {
    let mut report = MetricsReport::default();
    let mut cursor = ForecastCursor::new();
    let mut previous_end: Option<DateTime<Utc>> = None;

    let mut total_cost = 0.0;
    let mut total_over = 0.0;
    let mut total_under = 0.0;
    let mut total_elapsed = 0.0;
    let mut total_shadow = 0.0;
    let mut total_transition = 0.0;
    let mut vm_scaling = 0u32;
    let mut container_scaling = 0u32;
    let mut scaling = 0u32;

    if let Some(last) = actions.last() {
        let covered_until = forecast.last().map(|s| s.timestamp);
        if covered_until.map_or(true, |t| t < last.time_start) {
            report.warnings.push(DataIntegrityWarning::ForecastShortfall {
                covered_until,
                last_action_start: last.time_start,
            });
        }
    }

    for (index, action) in actions.iter_mut().enumerate() {
        let capacity = action.capacity.requests_capacity;

        let window = cursor.advance(forecast, action.time_end, capacity);
        if window.consumed == 0 {
            report
                .warnings
                .push(DataIntegrityWarning::NoForecastCoverage { action_index: index });
        }
        for timestamp in &window.zero_demand {
            report.warnings.push(DataIntegrityWarning::ZeroDemandSample {
                action_index: index,
                timestamp: *timestamp,
            });
        }
        total_over += window.over_provision();
        total_under += window.under_provision();

        let vm_changed = action.desired_state.vms != action.initial_state.vms;
        let desired_replicas = action.desired_state.services.get(&config.main_service_name);
        let initial_replicas = action.initial_state.services.get(&config.main_service_name);
        let container_changed = desired_replicas != initial_replicas;
        if vm_changed {
            vm_scaling += 1;
        }
        if container_changed {
            container_scaling += 1;
        }
        if vm_changed || container_changed {
            scaling += 1;
        }

        let unknown: BTreeSet<&String> = action
            .initial_state
            .vms
            .keys()
            .chain(action.desired_state.vms.keys())
            .filter(|vm_type| !catalog.contains(vm_type))
            .collect();
        for vm_type in unknown {
            report.warnings.push(DataIntegrityWarning::UnknownVmType {
                action_index: index,
                vm_type: vm_type.clone(),
            });
        }

        let billed_units = config
            .pricing
            .billing_unit
            .billed_units(action.time_start, action.time_end) as f64;
        let mut cost = 0.0;
        let mut total_cpu = 0.0;
        let mut total_mem = 0.0;
        for (vm_type, count) in &action.desired_state.vms {
            report.vm_types.insert(vm_type.clone());
            if let Some(profile) = catalog.get(vm_type) {
                let count = *count as f64;
                total_cpu += profile.cpu_cores * count;
                total_mem += profile.memory_gb * count;
                cost += round_to(profile.pricing.price * count * billed_units, 2);
            }
        }
        let cost = round_to(cost, 2);
        total_cost += cost;

        let (cpu_demand, mem_demand) = desired_replicas
            .map(|r| (r.cpu * r.scale as f64, r.memory * r.scale as f64))
            .unwrap_or_default();
        let cpu_utilization = utilization(cpu_demand, total_cpu).unwrap_or_else(|| {
            report.warnings.push(DataIntegrityWarning::ZeroCapacity {
                action_index: index,
                resource: Resource::Cpu,
            });
            0.0
        });
        let mem_utilization = utilization(mem_demand, total_mem).unwrap_or_else(|| {
            report.warnings.push(DataIntegrityWarning::ZeroCapacity {
                action_index: index,
                resource: Resource::Memory,
            });
            0.0
        });

        let (shadow_time, transition_time) = match previous_end {
            Some(end) => (
                seconds_between(action.time_start, end),
                seconds_between(action.time_start_transition, end),
            ),
            None => (0.0, 0.0),
        };
        total_shadow += shadow_time;
        total_transition += transition_time;

        let elapsed_time = seconds_between(action.time_start, action.time_end);
        total_elapsed += elapsed_time;

        action.metrics = ConfigMetrics {
            under_provision_pct: round_to(window.under_provision(), 2),
            over_provision_pct: round_to(window.over_provision(), 2),
            cost,
            transition_time_sec: transition_time,
            elapsed_time_sec: elapsed_time,
            shadow_time_sec: shadow_time,
            requests_capacity: capacity,
            cpu_utilization_pct: cpu_utilization,
            mem_utilization_pct: mem_utilization,
        };
        previous_end = Some(action.time_end);
    }

    let count = actions.len() as u32;
    report.metrics = PolicyMetrics {
        cost: round_to(total_cost, 2),
        over_provision_pct: round_to(mean(total_over, count), 2),
        under_provision_pct: round_to(mean(total_under, count), 2),
        number_vm_scaling_actions: vm_scaling,
        number_container_scaling_actions: container_scaling,
        number_scaling_actions: scaling,
        avg_elapsed_time_sec: round_to(mean(total_elapsed, count), 2),
        avg_shadow_time_sec: round_to(mean(total_shadow, count), 2),
        avg_transition_time_sec: round_to(mean(total_transition, count), 2),
        ..Default::default()
    };
    report
}

fn utilization(demand: f64, capacity: f64) -> Option<f64> {
    if capacity > 0.0 {
        Some(demand * 100.0 / capacity)
    } else {
        None
    }
}

/// Seconds from `from` to `to`, negative when `to` precedes `from`
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::pricing::{BillingUnit, PricingModel};
    use crate::models::{
        CapacityMetrics, ClusterState, Pricing, ServiceReplicaState, VmProfile,
    };
    use chrono::{Duration, TimeZone};

    const SERVICE: &str = "api";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn config() -> SelectionConfig {
        SelectionConfig {
            main_service_name: SERVICE.to_string(),
            pricing: PricingModel {
                budget: 1_000.0,
                billing_unit: BillingUnit::Hour,
            },
        }
    }

    fn catalog() -> VmCatalog {
        VmCatalog::new(vec![
            VmProfile {
                vm_type: "small".to_string(),
                cpu_cores: 2.0,
                memory_gb: 4.0,
                pricing: Pricing { price: 1.5 },
            },
            VmProfile {
                vm_type: "large".to_string(),
                cpu_cores: 8.0,
                memory_gb: 16.0,
                pricing: Pricing { price: 5.0 },
            },
        ])
    }

    fn state(vms: &[(&str, u32)], scale: u32) -> ClusterState {
        let mut state = ClusterState::default();
        for (vm_type, count) in vms {
            state.vms.insert(vm_type.to_string(), *count);
        }
        state.services.insert(
            SERVICE.to_string(),
            ServiceReplicaState {
                cpu: 0.5,
                memory: 1.0,
                scale,
            },
        );
        state
    }

    fn action(
        start_h: i64,
        end_h: i64,
        initial: ClusterState,
        desired: ClusterState,
        capacity: f64,
    ) -> ScalingAction {
        ScalingAction {
            time_start: t0() + Duration::hours(start_h),
            time_end: t0() + Duration::hours(end_h),
            time_start_transition: t0() + Duration::hours(start_h) - Duration::minutes(5),
            initial_state: initial,
            desired_state: desired,
            capacity: CapacityMetrics {
                requests_capacity: capacity,
            },
            metrics: ConfigMetrics::default(),
        }
    }

    fn flat_forecast(hours: i64, requests: f64) -> Vec<ForecastedValue> {
        (0..hours * 4)
            .map(|i| ForecastedValue {
                timestamp: t0() + Duration::minutes(15 * i),
                requests,
            })
            .collect()
    }

    #[test]
    fn test_constant_over_provision() {
        let mut actions = vec![action(0, 2, state(&[], 0), state(&[("small", 2)], 4), 150.0)];
        let forecast = flat_forecast(2, 100.0);

        let report = compute_policy_metrics(&mut actions, &forecast, &config(), &catalog());

        assert_eq!(actions[0].metrics.over_provision_pct, 50.0);
        assert_eq!(actions[0].metrics.under_provision_pct, 0.0);
        assert_eq!(report.metrics.over_provision_pct, 50.0);
        assert_eq!(report.metrics.under_provision_pct, 0.0);
    }

    #[test]
    fn test_under_provision_uses_own_samples() {
        let mut actions = vec![
            action(0, 1, state(&[], 0), state(&[("small", 1)], 2), 50.0),
            action(1, 2, state(&[("small", 1)], 2), state(&[("small", 2)], 4), 200.0),
        ];
        let forecast = flat_forecast(2, 100.0);

        let report = compute_policy_metrics(&mut actions, &forecast, &config(), &catalog());

        assert_eq!(actions[0].metrics.under_provision_pct, 50.0);
        assert_eq!(actions[0].metrics.over_provision_pct, 0.0);
        assert_eq!(actions[1].metrics.over_provision_pct, 100.0);
        assert_eq!(actions[1].metrics.under_provision_pct, 0.0);
        // Policy averages divide by the number of actions
        assert_eq!(report.metrics.under_provision_pct, 25.0);
        assert_eq!(report.metrics.over_provision_pct, 50.0);
    }

    #[test]
    fn test_cursor_never_rewinds() {
        let forecast = flat_forecast(2, 100.0);
        let mut cursor = ForecastCursor::new();

        let first = cursor.advance(&forecast, t0() + Duration::hours(1), 100.0);
        assert_eq!(first.consumed, 4);
        assert_eq!(cursor.position(), 4);

        // An earlier end time consumes nothing
        let again = cursor.advance(&forecast, t0() + Duration::minutes(30), 100.0);
        assert_eq!(again.consumed, 0);
        assert_eq!(cursor.position(), 4);

        let rest = cursor.advance(&forecast, t0() + Duration::hours(10), 100.0);
        assert_eq!(rest.consumed, 4);
        let past_end = cursor.advance(&forecast, t0() + Duration::hours(20), 100.0);
        assert_eq!(past_end.consumed, 0);
    }

    #[test]
    fn test_cost_rounds_partial_billing_units_up() {
        let mut a = action(0, 2, state(&[], 0), state(&[("small", 2), ("large", 1)], 4), 100.0);
        a.time_end = t0() + Duration::minutes(90);
        let mut actions = vec![a];

        let report =
            compute_policy_metrics(&mut actions, &flat_forecast(2, 100.0), &config(), &catalog());

        // 2 billed hours: small 1.5 * 2 * 2 + large 5.0 * 1 * 2
        assert_eq!(actions[0].metrics.cost, 16.0);
        assert_eq!(report.metrics.cost, 16.0);
        assert_eq!(
            report.vm_types.iter().cloned().collect::<Vec<_>>(),
            vec!["large".to_string(), "small".to_string()]
        );
    }

    #[test]
    fn test_reconfiguration_counters() {
        let mut actions = vec![
            // VM and container change
            action(0, 1, state(&[("small", 1)], 2), state(&[("small", 2)], 4), 100.0),
            // container-only change
            action(1, 2, state(&[("small", 2)], 4), state(&[("small", 2)], 3), 100.0),
            // no change
            action(2, 3, state(&[("small", 2)], 3), state(&[("small", 2)], 3), 100.0),
        ];

        let report =
            compute_policy_metrics(&mut actions, &flat_forecast(3, 100.0), &config(), &catalog());

        assert_eq!(report.metrics.number_vm_scaling_actions, 1);
        assert_eq!(report.metrics.number_container_scaling_actions, 2);
        assert_eq!(report.metrics.number_scaling_actions, 2);
    }

    #[test]
    fn test_utilization() {
        // 4 replicas * 0.5 cpu = 2 cores of 4; 4 replicas * 1 GB = 4 GB of 8
        let mut actions = vec![action(0, 1, state(&[], 0), state(&[("small", 2)], 4), 100.0)];

        compute_policy_metrics(&mut actions, &flat_forecast(1, 100.0), &config(), &catalog());

        assert_eq!(actions[0].metrics.cpu_utilization_pct, 50.0);
        assert_eq!(actions[0].metrics.mem_utilization_pct, 50.0);
    }

    #[test]
    fn test_shadow_and_transition_from_second_action() {
        let mut second = action(1, 2, state(&[("small", 1)], 2), state(&[("small", 2)], 4), 100.0);
        second.time_start = t0() + Duration::minutes(50);
        second.time_start_transition = t0() + Duration::minutes(45);
        let mut actions = vec![
            action(0, 1, state(&[], 0), state(&[("small", 1)], 2), 100.0),
            second,
        ];

        let report =
            compute_policy_metrics(&mut actions, &flat_forecast(2, 100.0), &config(), &catalog());

        assert_eq!(actions[0].metrics.shadow_time_sec, 0.0);
        assert_eq!(actions[0].metrics.transition_time_sec, 0.0);
        assert_eq!(actions[1].metrics.shadow_time_sec, 600.0);
        assert_eq!(actions[1].metrics.transition_time_sec, 900.0);
        assert_eq!(report.metrics.avg_shadow_time_sec, 300.0);
        assert_eq!(report.metrics.avg_transition_time_sec, 450.0);
        assert_eq!(actions[1].metrics.elapsed_time_sec, 4200.0);
    }

    #[test]
    fn test_empty_policy_has_zero_averages() {
        let mut actions: Vec<ScalingAction> = Vec::new();

        let report =
            compute_policy_metrics(&mut actions, &flat_forecast(1, 100.0), &config(), &catalog());

        let m = &report.metrics;
        for value in [
            m.over_provision_pct,
            m.under_provision_pct,
            m.avg_elapsed_time_sec,
            m.avg_shadow_time_sec,
            m.avg_transition_time_sec,
            m.cost,
        ] {
            assert!(value.is_finite());
            assert_eq!(value, 0.0);
        }
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unknown_vm_type_is_zero_and_reported() {
        let mut actions = vec![action(
            0,
            1,
            state(&[], 0),
            state(&[("small", 1), ("mystery", 3)], 2),
            100.0,
        )];

        let report =
            compute_policy_metrics(&mut actions, &flat_forecast(1, 100.0), &config(), &catalog());

        assert_eq!(actions[0].metrics.cost, 1.5);
        assert!(report.vm_types.contains("mystery"));
        assert!(report.warnings.contains(&DataIntegrityWarning::UnknownVmType {
            action_index: 0,
            vm_type: "mystery".to_string(),
        }));
    }

    #[test]
    fn test_empty_forecast_degrades_gracefully() {
        let mut actions = vec![action(0, 1, state(&[], 0), state(&[("small", 1)], 2), 100.0)];

        let report = compute_policy_metrics(&mut actions, &[], &config(), &catalog());

        assert_eq!(actions[0].metrics.over_provision_pct, 0.0);
        assert_eq!(actions[0].metrics.under_provision_pct, 0.0);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind() == "forecast_shortfall"));
        assert!(report
            .warnings
            .contains(&DataIntegrityWarning::NoForecastCoverage { action_index: 0 }));
    }

    #[test]
    fn test_forecast_shortfall_reports_last_action_start() {
        let actions = || {
            vec![
                action(0, 2, state(&[], 0), state(&[("small", 1)], 2), 100.0),
                action(2, 4, state(&[("small", 1)], 2), state(&[("small", 2)], 4), 200.0),
            ]
        };

        let mut short = actions();
        let report = compute_policy_metrics(&mut short, &flat_forecast(2, 80.0), &config(), &catalog());
        assert!(report.warnings.contains(&DataIntegrityWarning::ForecastShortfall {
            covered_until: Some(t0() + Duration::minutes(105)),
            last_action_start: t0() + Duration::hours(2),
        }));

        let mut reaching = actions();
        let report =
            compute_policy_metrics(&mut reaching, &flat_forecast(3, 80.0), &config(), &catalog());
        assert!(!report
            .warnings
            .iter()
            .any(|w| w.kind() == "forecast_shortfall"));
    }

    #[test]
    fn test_zero_demand_and_zero_capacity_do_not_divide_by_zero() {
        let mut actions = vec![action(0, 1, state(&[], 0), state(&[], 2), 100.0)];
        let forecast = flat_forecast(1, 0.0);

        let report = compute_policy_metrics(&mut actions, &forecast, &config(), &catalog());

        let metrics = &actions[0].metrics;
        assert_eq!(metrics.over_provision_pct, 0.0);
        assert_eq!(metrics.cpu_utilization_pct, 0.0);
        assert_eq!(metrics.mem_utilization_pct, 0.0);
        assert_eq!(
            report
                .warnings
                .iter()
                .filter(|w| w.kind() == "zero_demand_sample")
                .count(),
            4
        );
        assert_eq!(
            report
                .warnings
                .iter()
                .filter(|w| w.kind() == "zero_capacity")
                .count(),
            2
        );
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let mut actions = vec![
            action(0, 1, state(&[], 0), state(&[("small", 1)], 2), 80.0),
            action(1, 3, state(&[("small", 1)], 2), state(&[("large", 1)], 6), 130.0),
        ];
        let forecast = flat_forecast(3, 100.0);

        let first = compute_policy_metrics(&mut actions, &forecast, &config(), &catalog());
        let first_actions = actions.clone();
        let second = compute_policy_metrics(&mut actions, &forecast, &config(), &catalog());

        assert_eq!(first.metrics, second.metrics);
        assert_eq!(first_actions, actions);
    }
}
