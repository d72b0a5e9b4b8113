use super::{window_key, DocumentCollection, PolicyStore, StoreError, StoreResult};
use crate::models::{Policy, PolicyStatus};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// Policies are kept in one collection per service
pub fn policy_collection_name(service_name: &str) -> String {
    format!("policies_{}", service_name)
}

pub struct DocumentPolicyStore {
    collection: DocumentCollection<Policy>,
}

impl DocumentPolicyStore {
    pub fn in_memory(service_name: &str) -> Self {
        Self {
            collection: DocumentCollection::in_memory(policy_collection_name(service_name)),
        }
    }

    pub async fn open(dir: &Path, service_name: &str, retry: &RetryPolicy) -> StoreResult<Self> {
        let collection =
            DocumentCollection::open(dir, &policy_collection_name(service_name), retry).await?;
        Ok(Self { collection })
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    fn window_not_found(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreError {
        StoreError::NotFound {
            collection: self.collection.name().to_string(),
            id: window_key(start, end),
        }
    }
}

#[async_trait]
impl PolicyStore for DocumentPolicyStore {
    async fn find_all(&self) -> StoreResult<Vec<Policy>> {
        Ok(self.collection.find(|_| true).await)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Policy> {
        self.collection.get(id).await
    }

    async fn find_by_start_time(&self, time: DateTime<Utc>) -> StoreResult<Vec<Policy>> {
        Ok(self
            .collection
            .find(|p| p.time_window_start >= time)
            .await)
    }

    async fn find_by_end_time(&self, time: DateTime<Utc>) -> StoreResult<Vec<Policy>> {
        Ok(self.collection.find(|p| p.time_window_end <= time).await)
    }

    async fn find_all_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Policy>> {
        Ok(self
            .collection
            .find(|p| p.time_window_start >= start && p.time_window_end <= end)
            .await)
    }

    async fn find_one_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Policy> {
        self.collection
            .find_one(|p| p.time_window_start == start && p.time_window_end == end)
            .await
            .ok_or_else(|| self.window_not_found(start, end))
    }

    async fn find_selected_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Policy> {
        self.collection
            .find_one(|p| {
                p.time_window_start == start
                    && p.time_window_end == end
                    && p.status == PolicyStatus::Selected
            })
            .await
            .ok_or_else(|| self.window_not_found(start, end))
    }

    async fn insert(&self, policy: Policy) -> StoreResult<()> {
        self.collection.insert(policy).await
    }

    async fn update_by_id(&self, id: Uuid, policy: Policy) -> StoreResult<()> {
        self.collection.update(id, policy).await
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.collection.delete(id).await
    }

    async fn save_selection(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mut selected: Policy,
        others: Vec<Policy>,
    ) -> StoreResult<()> {
        selected.status = PolicyStatus::Selected;
        let selected_id = selected.id;
        self.collection
            .modify(|docs| {
                for p in docs.iter_mut().filter(|p| {
                    p.time_window_start == start
                        && p.time_window_end == end
                        && p.id != selected_id
                }) {
                    p.status = PolicyStatus::Candidate;
                }
                let others = others.into_iter().map(|mut p| {
                    p.status = PolicyStatus::Candidate;
                    p
                });
                for policy in std::iter::once(selected).chain(others) {
                    match docs.iter_mut().find(|d| d.id == policy.id) {
                        Some(slot) => *slot = policy,
                        None => docs.push(policy),
                    }
                }
                Ok(())
            })
            .await
    }

    async fn delete_all_by_time_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<usize> {
        self.collection
            .delete_where(|p| p.time_window_start >= start && p.time_window_end <= end)
            .await
    }
}
