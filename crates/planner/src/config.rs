//! Planner configuration
//!
//! Read from an optional YAML file (`PLANNER_CONFIG`, default
//! `planner.yaml`) overlaid with `PLANNER__*` environment variables, e.g.
//! `PLANNER__PRICING__BUDGET=250`.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use planner_lib::evaluation::{PricingModel, SelectionConfig};
use planner_lib::{CycleConfig, PlanningWindow, RetryPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "PLANNER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "planner.yaml";

/// Planner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Service whose policies are planned
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// API server port for policies, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the policy and forecast collections
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub scaling_horizon: ScalingHorizon,

    #[serde(default)]
    pub pricing: PricingModel,

    /// Performance-profiling service
    #[serde(default = "default_profiles_endpoint")]
    pub profiles_endpoint: String,

    /// Scheduler receiving the selected policy's transitions
    #[serde(default = "default_scheduler_endpoint")]
    pub scheduler_endpoint: String,

    #[serde(default)]
    pub trigger_reconfiguration: bool,

    /// Seconds between periodic cycles; defaults to the horizon length
    #[serde(default)]
    pub planning_interval_secs: Option<u64>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// First planning window; later windows follow back to back
#[derive(Debug, Clone, Deserialize)]
pub struct ScalingHorizon {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Default for ScalingHorizon {
    /// The next 24 hours, starting at the current hour
    fn default() -> Self {
        let now = Utc::now();
        let start_time = now.duration_trunc(ChronoDuration::hours(1)).unwrap_or(now);
        Self {
            start_time,
            end_time: start_time + ChronoDuration::hours(24),
        }
    }
}

fn default_service_name() -> String {
    "main-service".to_string()
}

fn default_api_port() -> u16 {
    8083
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_profiles_endpoint() -> String {
    "http://localhost:8082".to_string()
}

fn default_scheduler_endpoint() -> String {
    "http://localhost:8081".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl PlannerConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::from_file(Path::new(&path))
    }

    /// Load `path` (if it exists) overlaid with the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("PLANNER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let parsed: PlannerConfig = config
            .try_deserialize()
            .context("Invalid planner configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        if self.scaling_horizon.end_time <= self.scaling_horizon.start_time {
            anyhow::bail!(
                "scaling horizon must end after it starts ({} - {})",
                self.scaling_horizon.start_time,
                self.scaling_horizon.end_time
            );
        }
        let budget = self.pricing.budget;
        if budget.is_nan() || budget < 0.0 {
            anyhow::bail!("budget must be a non-negative number, got {}", budget);
        }
        Ok(())
    }

    pub fn window(&self) -> PlanningWindow {
        PlanningWindow {
            start: self.scaling_horizon.start_time,
            end: self.scaling_horizon.end_time,
        }
    }

    pub fn planning_interval(&self) -> Duration {
        match self.planning_interval_secs {
            Some(secs) => Duration::from_secs(secs.max(1)),
            None => self
                .window()
                .size()
                .to_std()
                .unwrap_or(Duration::from_secs(3600)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            selection: SelectionConfig {
                main_service_name: self.service_name.clone(),
                pricing: self.pricing.clone(),
            },
            trigger_reconfiguration: self.trigger_reconfiguration,
        }
    }
}
