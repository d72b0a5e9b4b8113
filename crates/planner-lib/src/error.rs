//! Selection error types

use crate::models::Policy;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by policy selection
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no suitable policy found")]
    NoSuitablePolicy,

    /// The best candidate is returned unselected so the caller can inspect
    /// it or retry with a higher budget.
    #[error(
        "budget of {budget:.2} is not enough for the time window, increase the budget to ensure resources after {violation_time}"
    )]
    BudgetExceeded {
        violation_time: DateTime<Utc>,
        cumulative_cost: f64,
        budget: f64,
        candidate: Box<Policy>,
    },
}

impl SelectionError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SelectionError::NoSuitablePolicy => "no_suitable_policy",
            SelectionError::BudgetExceeded { .. } => "budget_exceeded",
        }
    }
}

pub type SelectionResult<T> = Result<T, SelectionError>;
