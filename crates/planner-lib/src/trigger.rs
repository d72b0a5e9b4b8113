//! Hand-off of a selected policy to the external scheduler
//!
//! Each scaling action becomes one "apply this state" request, sent in
//! order. The first failure stops the run; the returned report tells the
//! caller which transitions went through and which are still pending so it
//! can resume, roll back or escalate.

use crate::models::{ClusterState, Policy};
use crate::profiles::base_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("scheduler request failed: {0}")]
    Request(String),

    #[error("scheduler rejected state ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid scheduler endpoint: {0}")]
    Endpoint(String),
}

/// Body of a state request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    pub time: DateTime<Utc>,
    pub state: ClusterState,
}

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Ask the scheduler to reach `state` at `time`
    async fn apply_state(&self, time: DateTime<Utc>, state: &ClusterState)
        -> Result<(), TriggerError>;
}

/// Scheduler reached over HTTP, `POST {endpoint}/api/states`
pub struct HttpSchedulerClient {
    client: Client,
    states_url: Url,
}

impl HttpSchedulerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TriggerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriggerError::Request(e.to_string()))?;
        let states_url = base_url(endpoint)
            .and_then(|url| Ok(url.join("api/states")?))
            .map_err(|e| TriggerError::Endpoint(e.to_string()))?;
        Ok(Self { client, states_url })
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn apply_state(
        &self,
        time: DateTime<Utc>,
        state: &ClusterState,
    ) -> Result<(), TriggerError> {
        let body = StateRequest {
            time,
            state: state.clone(),
        };
        let response = self
            .client
            .post(self.states_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| TriggerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TriggerError::Rejected { status, body });
        }
        Ok(())
    }
}

/// The transition that stopped a reconfiguration run
#[derive(Debug, Clone, Serialize)]
pub struct FailedTransition {
    pub action_index: usize,
    pub time: DateTime<Utc>,
    pub error: String,
}

/// Outcome of pushing a policy's transitions to the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct ReconfigurationReport {
    pub policy_id: Uuid,
    /// Indices of actions the scheduler accepted
    pub succeeded: Vec<usize>,
    pub failed: Option<FailedTransition>,
    /// Indices of actions not attempted because of the failure
    pub pending: Vec<usize>,
}

impl ReconfigurationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }

    /// Index to pass to [`ReconfigurationTrigger::resume`] to retry from the failure
    pub fn resume_from(&self) -> Option<usize> {
        self.failed.as_ref().map(|f| f.action_index)
    }
}

#[derive(Clone)]
pub struct ReconfigurationTrigger {
    client: Arc<dyn SchedulerClient>,
}

impl ReconfigurationTrigger {
    pub fn new(client: Arc<dyn SchedulerClient>) -> Self {
        Self { client }
    }

    /// Send every transition of `policy`
    pub async fn apply(&self, policy: &Policy) -> ReconfigurationReport {
        self.resume(policy, 0).await
    }

    /// Send the transitions of `policy` starting at action `from_index`
    pub async fn resume(&self, policy: &Policy, from_index: usize) -> ReconfigurationReport {
        let mut report = ReconfigurationReport {
            policy_id: policy.id,
            succeeded: Vec::new(),
            failed: None,
            pending: Vec::new(),
        };

        let actions = &policy.scaling_actions;
        for (index, action) in actions.iter().enumerate().skip(from_index) {
            match self
                .client
                .apply_state(action.time_start, &action.desired_state)
                .await
            {
                Ok(()) => report.succeeded.push(index),
                Err(e) => {
                    warn!(
                        policy_id = %policy.id,
                        action_index = index,
                        time = %action.time_start,
                        error = %e,
                        "Scheduler rejected transition, stopping reconfiguration"
                    );
                    report.failed = Some(FailedTransition {
                        action_index: index,
                        time: action.time_start,
                        error: e.to_string(),
                    });
                    report.pending = (index + 1..actions.len()).collect();
                    return report;
                }
            }
        }

        info!(
            policy_id = %policy.id,
            transitions = report.succeeded.len(),
            "Policy transitions handed to scheduler"
        );
        report
    }
}
