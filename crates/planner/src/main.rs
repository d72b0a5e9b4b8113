//! Scaling planner - scaling policy evaluation and selection service
//!
//! Periodically, and whenever a new forecast is pushed, evaluates the
//! candidate policies for the scaling horizon, selects one within budget
//! and optionally hands it to the scheduler.

use anyhow::{Context, Result};
use planner_lib::{
    health::{components, HealthRegistry},
    observability::{PlannerMetrics, StructuredLogger},
    profiles::HttpProfileSource,
    store::{DocumentForecastStore, DocumentPolicyStore},
    trigger::{HttpSchedulerClient, ReconfigurationTrigger},
    CycleDeps, CycleWorker, PlanningCycle, StoredCandidates,
};
use scaling_planner::{api, config::PlannerConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PLANNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting scaling-planner");

    let config = PlannerConfig::load()?;
    let window = config.window();
    info!(
        service = %config.service_name,
        window_start = %window.start,
        window_end = %window.end,
        budget = config.pricing.budget,
        billing_unit = %config.pricing.billing_unit,
        "Planner configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all(components::ALL).await;

    let metrics = PlannerMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    // Storage
    let policies = Arc::new(
        DocumentPolicyStore::open(&config.data_dir, &config.service_name, &config.retry)
            .await
            .context("Failed to open policy store")?,
    );
    let forecasts = Arc::new(
        DocumentForecastStore::open(&config.data_dir, &config.retry)
            .await
            .context("Failed to open forecast store")?,
    );

    // Remote collaborators
    let profiles = Arc::new(HttpProfileSource::new(
        &config.profiles_endpoint,
        config.request_timeout(),
        config.retry.clone(),
    )?);
    let trigger = if config.trigger_reconfiguration {
        let client = HttpSchedulerClient::new(&config.scheduler_endpoint, config.request_timeout())?;
        Some(ReconfigurationTrigger::new(Arc::new(client)))
    } else {
        None
    };

    let deps = CycleDeps {
        policies: policies.clone(),
        forecasts,
        profiles,
        candidates: Arc::new(StoredCandidates::new(policies.clone())),
        trigger,
    };
    let cycle = Arc::new(PlanningCycle::new(
        config.cycle_config(),
        deps,
        health_registry.clone(),
    ));
    let (worker, forecast_tx) = CycleWorker::new(cycle, window, config.planning_interval());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        policies,
        forecast_tx,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let worker_handle = tokio::spawn(worker.run(shutdown_tx.subscribe()));
    let api_port = config.api_port;
    let api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state, api_shutdown).await {
            error!(error = %e, "API server failed");
        }
    });

    health_registry.set_ready(true).await;
    logger.log_startup(PLANNER_VERSION, &format!("0.0.0.0:{}", api_port));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    let _ = worker_handle.await;
    let _ = api_handle.await;
    info!("Shutdown complete");

    Ok(())
}
