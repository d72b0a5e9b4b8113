//! Local evaluation of a candidate batch
//!
//! Runs the selection engine in-process on a JSON batch file, without a
//! running planner:
//!
//! ```json
//! {
//!   "config": {"main_service_name": "web", "pricing": {"budget": 100.0, "billing_unit": "hour"}},
//!   "vm_profiles": [...],
//!   "forecast": [{"timestamp": "...", "requests": 120.0}],
//!   "policies": [...]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use planner_lib::evaluation::{evaluate_candidates, select_evaluated, EvaluationWarning};
use planner_lib::{
    ForecastedValue, Policy, PolicyStatus, SelectionConfig, SelectionError, VmCatalog, VmProfile,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::output::{
    format_cost, print_error, print_policy_table, print_success, print_warning, OutputFormat,
};

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationBatch {
    pub config: SelectionConfig,
    pub vm_profiles: Vec<VmProfile>,
    pub forecast: Vec<ForecastedValue>,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Selected {
        policy_id: Uuid,
        cost: f64,
    },
    BudgetExceeded {
        policy_id: Uuid,
        budget: f64,
        cumulative_cost: f64,
        violation_time: DateTime<Utc>,
        message: String,
    },
    NoSuitablePolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Evaluated candidates, best first
    pub ranking: Vec<Policy>,
    pub warnings: Vec<EvaluationWarning>,
    pub outcome: Outcome,
}

/// Score, rank and select over a batch
pub fn run_batch(batch: EvaluationBatch) -> EvaluationReport {
    let catalog = VmCatalog::new(batch.vm_profiles);
    let evaluation = evaluate_candidates(batch.policies, &batch.config, &catalog, &batch.forecast);
    let mut ranking = evaluation.policies.clone();
    let warnings = evaluation.warnings.clone();

    let outcome = match select_evaluated(evaluation, &batch.config) {
        Ok(selection) => Outcome::Selected {
            policy_id: selection.policy.id,
            cost: selection.policy.metrics.cost,
        },
        Err(e) => {
            let message = e.to_string();
            match e {
                SelectionError::NoSuitablePolicy => Outcome::NoSuitablePolicy,
                SelectionError::BudgetExceeded {
                    violation_time,
                    cumulative_cost,
                    budget,
                    candidate,
                } => Outcome::BudgetExceeded {
                    policy_id: candidate.id,
                    budget,
                    cumulative_cost,
                    violation_time,
                    message,
                },
            }
        }
    };

    if let Outcome::Selected { policy_id, .. } = &outcome {
        for policy in ranking.iter_mut().filter(|p| p.id == *policy_id) {
            policy.status = PolicyStatus::Selected;
        }
    }

    EvaluationReport {
        ranking,
        warnings,
        outcome,
    }
}

pub fn read_batch(path: &Path) -> Result<EvaluationBatch> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse evaluation batch")
}

/// Evaluate a batch file and print the ranking and the outcome
pub fn evaluate_batch(path: &Path, format: OutputFormat) -> Result<()> {
    let report = run_batch(read_batch(path)?);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            if report.ranking.is_empty() {
                print_warning("Batch contains no candidate policies");
            } else {
                print_policy_table(&report.ranking);
            }
            for w in &report.warnings {
                print_warning(&format!("policy {}: {}", w.policy_id, w.warning));
            }
            println!();
            match &report.outcome {
                Outcome::Selected { policy_id, cost } => print_success(&format!(
                    "Selected policy {} with cost {}",
                    policy_id,
                    format_cost(*cost)
                )),
                Outcome::BudgetExceeded { message, .. } => print_error(message),
                Outcome::NoSuitablePolicy => print_error("No suitable policy found"),
            }
        }
    }
    Ok(())
}
