//! Budget gate
//!
//! Accrues the projected spend of a policy action by action and rejects it
//! at the first action whose cumulative cost exceeds the budget.

use crate::models::Policy;
use chrono::{DateTime, Utc};

/// Outcome of checking a policy against the budget
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetDecision {
    Accepted {
        total_cost: f64,
    },
    Rejected {
        /// Start of the first action that can no longer be afforded
        violation_time: DateTime<Utc>,
        cumulative_cost: f64,
    },
}

impl BudgetDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BudgetDecision::Accepted { .. })
    }
}

/// Spending limit for one scaling horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetGate {
    budget: f64,
}

impl BudgetGate {
    pub fn new(budget: f64) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Check an evaluated policy. Uses the per-action costs computed by the
    /// metrics pass, which already include billing-unit rounding.
    ///
    /// A NaN budget or cost never compares as affordable, so the first
    /// action is rejected.
    pub fn evaluate(&self, policy: &Policy) -> BudgetDecision {
        let mut cumulative = 0.0;
        for action in &policy.scaling_actions {
            cumulative += action.metrics.cost;
            if cumulative > self.budget || cumulative.is_nan() || self.budget.is_nan() {
                return BudgetDecision::Rejected {
                    violation_time: action.time_start,
                    cumulative_cost: cumulative,
                };
            }
        }
        BudgetDecision::Accepted {
            total_cost: cumulative,
        }
    }
}
