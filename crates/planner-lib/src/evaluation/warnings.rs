//! Non-fatal data-quality findings raised while scoring a policy

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Resource dimension used for utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
}

/// Input problems that degrade metric accuracy without aborting evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIntegrityWarning {
    /// VM type missing from the catalog; priced and sized as zero
    UnknownVmType { action_index: usize, vm_type: String },
    /// No forecast sample fell inside the action's window
    NoForecastCoverage { action_index: usize },
    /// The last forecast sample lies before the start of the last action
    ForecastShortfall {
        covered_until: Option<DateTime<Utc>>,
        last_action_start: DateTime<Utc>,
    },
    /// A forecast sample with non-positive demand was skipped
    ZeroDemandSample {
        action_index: usize,
        timestamp: DateTime<Utc>,
    },
    /// The desired VM set provides no capacity for a resource
    ZeroCapacity {
        action_index: usize,
        resource: Resource,
    },
}

impl DataIntegrityWarning {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DataIntegrityWarning::UnknownVmType { .. } => "unknown_vm_type",
            DataIntegrityWarning::NoForecastCoverage { .. } => "no_forecast_coverage",
            DataIntegrityWarning::ForecastShortfall { .. } => "forecast_shortfall",
            DataIntegrityWarning::ZeroDemandSample { .. } => "zero_demand_sample",
            DataIntegrityWarning::ZeroCapacity { .. } => "zero_capacity",
        }
    }
}

impl fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIntegrityWarning::UnknownVmType {
                action_index,
                vm_type,
            } => write!(
                f,
                "action {}: VM type '{}' not found in catalog",
                action_index, vm_type
            ),
            DataIntegrityWarning::NoForecastCoverage { action_index } => {
                write!(f, "action {}: no forecast samples in window", action_index)
            }
            DataIntegrityWarning::ForecastShortfall {
                covered_until,
                last_action_start,
            } => match covered_until {
                Some(t) => write!(
                    f,
                    "forecast covers until {} but the last action starts at {}",
                    t, last_action_start
                ),
                None => write!(
                    f,
                    "forecast is empty, the last action starts at {}",
                    last_action_start
                ),
            },
            DataIntegrityWarning::ZeroDemandSample {
                action_index,
                timestamp,
            } => write!(
                f,
                "action {}: forecast sample at {} has no demand",
                action_index, timestamp
            ),
            DataIntegrityWarning::ZeroCapacity {
                action_index,
                resource,
            } => write!(
                f,
                "action {}: desired VM set has no {:?} capacity",
                action_index, resource
            ),
        }
    }
}

/// A warning attributed to the policy it was raised for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationWarning {
    pub policy_id: Uuid,
    pub warning: DataIntegrityWarning,
}
