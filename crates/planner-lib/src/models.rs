//! Core data models for the scaling policy planner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Policy parameter holding the comma-separated set of VM types a policy uses
pub const VM_TYPES_PARAM: &str = "vm-types";

/// A single forecasted load sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastedValue {
    pub timestamp: DateTime<Utc>,
    pub requests: f64,
}

/// Forecast of the expected load for one scaling horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub service_name: String,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
    pub forecasted_values: Vec<ForecastedValue>,
}

/// Price of a VM for one billing unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub price: f64,
}

/// Capacity and price of a virtual machine type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmProfile {
    pub vm_type: String,
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub pricing: Pricing,
}

/// Resource profile of the service being scaled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub service_name: String,
    pub cpu_per_replica: f64,
    pub memory_per_replica: f64,
    pub max_requests_per_replica: f64,
}

/// Replica configuration of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceReplicaState {
    pub cpu: f64,
    pub memory: f64,
    pub scale: u32,
}

/// VM allocation plus service replicas at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub vms: BTreeMap<String, u32>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceReplicaState>,
}

/// Capacity declared by the derivation stage for a scaling action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityMetrics {
    pub requests_capacity: f64,
}

/// Metrics computed for a single scaling action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetrics {
    pub under_provision_pct: f64,
    pub over_provision_pct: f64,
    pub cost: f64,
    pub transition_time_sec: f64,
    pub elapsed_time_sec: f64,
    pub shadow_time_sec: f64,
    pub requests_capacity: f64,
    pub cpu_utilization_pct: f64,
    pub mem_utilization_pct: f64,
}

/// One state transition of a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingAction {
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub time_start_transition: DateTime<Utc>,
    pub initial_state: ClusterState,
    pub desired_state: ClusterState,
    #[serde(default)]
    pub capacity: CapacityMetrics,
    #[serde(default)]
    pub metrics: ConfigMetrics,
}

/// Aggregated metrics of a policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetrics {
    pub cost: f64,
    pub over_provision_pct: f64,
    pub under_provision_pct: f64,
    pub number_vm_scaling_actions: u32,
    pub number_container_scaling_actions: u32,
    pub number_scaling_actions: u32,
    pub avg_elapsed_time_sec: f64,
    pub avg_shadow_time_sec: f64,
    pub avg_transition_time_sec: f64,
    pub derivation_duration_sec: f64,
    pub start_time_derivation: DateTime<Utc>,
    pub finish_time_derivation: DateTime<Utc>,
}

/// Lifecycle status of a policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    #[default]
    Candidate,
    Selected,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Candidate => "candidate",
            PolicyStatus::Selected => "selected",
        }
    }
}

/// A scaling policy: an ordered, non-overlapping sequence of scaling actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Derivation strategy that produced the policy
    #[serde(default)]
    pub algorithm: String,
    pub scaling_actions: Vec<ScalingAction>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: PolicyMetrics,
    #[serde(default)]
    pub status: PolicyStatus,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
}

impl Policy {
    /// VM types recorded by the last evaluation pass
    pub fn vm_types(&self) -> Vec<&str> {
        self.parameters
            .get(VM_TYPES_PARAM)
            .map(|s| s.split(',').filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn is_selected(&self) -> bool {
        self.status == PolicyStatus::Selected
    }
}
