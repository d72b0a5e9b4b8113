//! Selection orchestration
//!
//! Takes ownership of a candidate batch, scores every candidate, ranks them
//! and checks the best one against the budget.

use super::budget::{BudgetDecision, BudgetGate};
use super::metrics::compute_policy_metrics;
use super::pricing::round_to;
use super::ranker::rank;
use super::warnings::EvaluationWarning;
use super::SelectionConfig;
use crate::catalog::VmCatalog;
use crate::error::{SelectionError, SelectionResult};
use crate::models::{ForecastedValue, Policy, PolicyStatus, VM_TYPES_PARAM};
use tracing::{debug, info, warn};

/// Evaluated candidates, best first
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub policies: Vec<Policy>,
    pub warnings: Vec<EvaluationWarning>,
}

/// Outcome of a successful selection
#[derive(Debug, Clone)]
pub struct Selection {
    /// The winning policy, with status `Selected`
    pub policy: Policy,
    /// Remaining evaluated candidates in rank order
    pub others: Vec<Policy>,
    pub warnings: Vec<EvaluationWarning>,
}

/// Score and rank a batch of candidates without applying the budget
pub fn evaluate_candidates(
    policies: Vec<Policy>,
    config: &SelectionConfig,
    catalog: &VmCatalog,
    forecast: &[ForecastedValue],
) -> Evaluation {
    let mut warnings = Vec::new();
    let mut evaluated = Vec::with_capacity(policies.len());

    for mut policy in policies {
        let report =
            compute_policy_metrics(&mut policy.scaling_actions, forecast, config, catalog);

        let start = policy.metrics.start_time_derivation;
        let finish = policy.metrics.finish_time_derivation;
        let duration_secs = (finish - start).num_milliseconds() as f64 / 1000.0;

        policy.metrics = report.metrics;
        policy.metrics.start_time_derivation = start;
        policy.metrics.finish_time_derivation = finish;
        policy.metrics.derivation_duration_sec = round_to(duration_secs, 2);
        policy.parameters.insert(
            VM_TYPES_PARAM.to_string(),
            report.vm_types.into_iter().collect::<Vec<_>>().join(","),
        );
        policy.status = PolicyStatus::Candidate;

        for warning in report.warnings {
            warn!(
                policy_id = %policy.id,
                kind = warning.kind(),
                details = %warning,
                "Data integrity warning while evaluating policy"
            );
            warnings.push(EvaluationWarning {
                policy_id: policy.id,
                warning,
            });
        }

        debug!(
            policy_id = %policy.id,
            algorithm = %policy.algorithm,
            cost = policy.metrics.cost,
            over_provision_pct = policy.metrics.over_provision_pct,
            under_provision_pct = policy.metrics.under_provision_pct,
            container_scaling_actions = policy.metrics.number_container_scaling_actions,
            "Policy evaluated"
        );
        evaluated.push(policy);
    }

    Evaluation {
        policies: rank(evaluated),
        warnings,
    }
}

/// Evaluate the candidates and select the best one that fits the budget.
///
/// Fails with `NoSuitablePolicy` for an empty batch, and with
/// `BudgetExceeded` (carrying the unselected best candidate) when the best
/// candidate would overrun the budget.
pub fn select_policy(
    policies: Vec<Policy>,
    config: &SelectionConfig,
    catalog: &VmCatalog,
    forecast: &[ForecastedValue],
) -> SelectionResult<Selection> {
    if policies.is_empty() {
        return Err(SelectionError::NoSuitablePolicy);
    }
    select_evaluated(
        evaluate_candidates(policies, config, catalog, forecast),
        config,
    )
}

/// Apply the budget to an already scored and ranked batch
pub fn select_evaluated(
    evaluation: Evaluation,
    config: &SelectionConfig,
) -> SelectionResult<Selection> {
    let Evaluation {
        policies: ranked,
        warnings,
    } = evaluation;
    let mut ranked = ranked.into_iter();
    let Some(mut best) = ranked.next() else {
        return Err(SelectionError::NoSuitablePolicy);
    };

    let gate = BudgetGate::new(config.pricing.budget);
    match gate.evaluate(&best) {
        BudgetDecision::Accepted { total_cost } => {
            best.status = PolicyStatus::Selected;
            info!(
                policy_id = %best.id,
                algorithm = %best.algorithm,
                cost = total_cost,
                budget = gate.budget(),
                "Policy selected"
            );
            Ok(Selection {
                policy: best,
                others: ranked.collect(),
                warnings,
            })
        }
        BudgetDecision::Rejected {
            violation_time,
            cumulative_cost,
        } => {
            warn!(
                policy_id = %best.id,
                budget = gate.budget(),
                cumulative_cost = cumulative_cost,
                violation_time = %violation_time,
                "Best candidate exceeds budget"
            );
            Err(SelectionError::BudgetExceeded {
                violation_time,
                cumulative_cost,
                budget: gate.budget(),
                candidate: Box::new(best),
            })
        }
    }
}
