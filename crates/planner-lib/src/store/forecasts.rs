use super::{window_key, DocumentCollection, ForecastStore, StoreError, StoreResult};
use crate::models::Forecast;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

pub const FORECAST_COLLECTION: &str = "forecasts";

pub struct DocumentForecastStore {
    collection: DocumentCollection<Forecast>,
}

impl DocumentForecastStore {
    pub fn in_memory() -> Self {
        Self {
            collection: DocumentCollection::in_memory(FORECAST_COLLECTION),
        }
    }

    pub async fn open(dir: &Path, retry: &RetryPolicy) -> StoreResult<Self> {
        let collection = DocumentCollection::open(dir, FORECAST_COLLECTION, retry).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl ForecastStore for DocumentForecastStore {
    async fn find_all(&self) -> StoreResult<Vec<Forecast>> {
        Ok(self.collection.find(|_| true).await)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Forecast> {
        self.collection.get(id).await
    }

    async fn find_one_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Forecast> {
        self.collection
            .find_one(|f| f.time_window_start == start && f.time_window_end == end)
            .await
            .ok_or_else(|| StoreError::NotFound {
                collection: FORECAST_COLLECTION.to_string(),
                id: window_key(start, end),
            })
    }

    async fn insert(&self, forecast: Forecast) -> StoreResult<()> {
        self.collection.insert(forecast).await
    }

    async fn update_by_id(&self, id: Uuid, forecast: Forecast) -> StoreResult<()> {
        self.collection.update(id, forecast).await
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.collection.delete(id).await
    }
}
