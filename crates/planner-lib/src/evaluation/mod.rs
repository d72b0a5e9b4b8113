//! Policy evaluation and selection engine
//!
//! Scores candidate policies against a forecast, ranks them and enforces
//! the budget to pick one winner per scaling horizon. Pure computation: no
//! I/O, no shared state between calls.

mod budget;
mod metrics;
mod pricing;
mod ranker;
mod selection;
mod warnings;

pub use budget::{BudgetDecision, BudgetGate};
pub use metrics::{compute_policy_metrics, ForecastCursor, MetricsReport, ProvisionWindow};
pub use pricing::{round_to, BillingUnit, PricingModel};
pub use ranker::{compare, rank};
pub use selection::{evaluate_candidates, select_evaluated, select_policy, Evaluation, Selection};
pub use warnings::{DataIntegrityWarning, EvaluationWarning, Resource};

use serde::{Deserialize, Serialize};

/// Inputs of a selection pass that come from system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Service whose replica changes count as container scaling actions
    pub main_service_name: String,
    #[serde(default)]
    pub pricing: PricingModel,
}
