//! Persistence for policies and forecasts
//!
//! Stores are reached through the [`PolicyStore`] and [`ForecastStore`]
//! traits so the planning cycle and the API can run against either the
//! file-backed collections or purely in-memory ones in tests.

mod document;
mod forecasts;
mod policies;

pub use document::{Document, DocumentCollection};
pub use forecasts::DocumentForecastStore;
pub use policies::{policy_collection_name, DocumentPolicyStore};

use crate::models::{Forecast, Policy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}: document {id} not found")]
    NotFound { collection: String, id: String },

    #[error("{collection}: document {id} already exists")]
    Duplicate { collection: String, id: Uuid },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to the policies derived for one service
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<Policy>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Policy>;

    /// Policies whose window starts at or after `time`
    async fn find_by_start_time(&self, time: DateTime<Utc>) -> StoreResult<Vec<Policy>>;

    /// Policies whose window ends at or before `time`
    async fn find_by_end_time(&self, time: DateTime<Utc>) -> StoreResult<Vec<Policy>>;

    /// Policies whose window lies inside `[start, end]`
    async fn find_all_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Policy>>;

    /// A policy whose window is exactly `[start, end]`
    async fn find_one_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Policy>;

    /// The selected policy for exactly `[start, end]`
    async fn find_selected_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Policy>;

    async fn insert(&self, policy: Policy) -> StoreResult<()>;

    async fn update_by_id(&self, id: Uuid, policy: Policy) -> StoreResult<()>;

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;

    /// Store an evaluated batch for exactly `[start, end]` in one write.
    ///
    /// `selected` becomes the only selected policy of the window, any other
    /// policy there is demoted to candidate, and every policy in the batch
    /// is inserted or replaced. On error nothing is written.
    async fn save_selection(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        selected: Policy,
        others: Vec<Policy>,
    ) -> StoreResult<()>;

    /// Delete every policy inside `[start, end]`, returning the count
    async fn delete_all_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<usize>;
}

/// Access to stored demand forecasts
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<Forecast>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Forecast>;

    async fn find_one_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Forecast>;

    async fn insert(&self, forecast: Forecast) -> StoreResult<()>;

    async fn update_by_id(&self, id: Uuid, forecast: Forecast) -> StoreResult<()>;

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;
}

impl Document for Policy {
    fn id(&self) -> Uuid {
        self.id
    }

    fn window_start(&self) -> DateTime<Utc> {
        self.time_window_start
    }

    fn window_end(&self) -> DateTime<Utc> {
        self.time_window_end
    }
}

impl Document for Forecast {
    fn id(&self) -> Uuid {
        self.id
    }

    fn window_start(&self) -> DateTime<Utc> {
        self.time_window_start
    }

    fn window_end(&self) -> DateTime<Utc> {
        self.time_window_end
    }
}

fn window_key(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!("window {} - {}", start.to_rfc3339(), end.to_rfc3339())
}
