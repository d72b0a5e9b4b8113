//! Scaling policy planner library
//!
//! This crate provides the core functionality for:
//! - Scoring, ranking and budget-gating candidate scaling policies
//! - Persisting policies and forecasts
//! - Fetching VM and service profiles
//! - Handing selected policies to the scheduler
//! - Health checks and observability

pub mod catalog;
pub mod cycle;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod profiles;
pub mod retry;
pub mod store;
pub mod trigger;

pub use catalog::VmCatalog;
pub use cycle::{
    CandidateSource, CycleConfig, CycleDeps, CycleError, CycleOutcome, CycleTrigger,
    CycleWorker, PlanningCycle, PlanningWindow, StoredCandidates,
};
pub use error::{SelectionError, SelectionResult};
pub use evaluation::{evaluate_candidates, select_policy, Selection, SelectionConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PlannerMetrics, StructuredLogger};
pub use retry::RetryPolicy;
