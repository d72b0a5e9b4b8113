//! JSON document collections
//!
//! Each collection is held in memory and mirrored to a single JSON file.
//! Writes go to a temp file that is then renamed over the collection file,
//! and the in-memory copy is only replaced once the file write succeeded.

use super::{StoreError, StoreResult};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A document stored in a collection
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn window_start(&self) -> DateTime<Utc>;
    fn window_end(&self) -> DateTime<Utc>;
}

/// A named set of documents, optionally persisted to disk
pub struct DocumentCollection<T> {
    name: String,
    path: Option<PathBuf>,
    documents: RwLock<Vec<T>>,
}

impl<T: Document> DocumentCollection<T> {
    /// Create a collection that lives only in memory
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Open (or create) the collection file `<dir>/<name>.json`
    pub async fn open(dir: &Path, name: &str, retry: &RetryPolicy) -> StoreResult<Self> {
        let path = dir.join(format!("{}.json", name));
        let file = path.as_path();
        let documents = retry
            .run(&format!("open collection {}", name), || async move {
                std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
                load_documents::<T>(file)
            })
            .await?;

        info!(
            collection = %name,
            path = %path.display(),
            documents = documents.len(),
            "Opened document collection"
        );

        Ok(Self {
            name: name.to_string(),
            path: Some(path),
            documents: RwLock::new(documents),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// All documents matching `predicate`, in insertion order
    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.documents
            .read()
            .await
            .iter()
            .filter(|d| predicate(d))
            .cloned()
            .collect()
    }

    /// First document matching `predicate`
    pub async fn find_one(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| predicate(d))
            .cloned()
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<T> {
        self.find_one(|d| d.id() == id)
            .await
            .ok_or_else(|| self.not_found(id))
    }

    pub async fn insert(&self, document: T) -> StoreResult<()> {
        let id = document.id();
        self.modify(|docs| {
            if docs.iter().any(|d| d.id() == id) {
                return Err(StoreError::Duplicate {
                    collection: self.name.clone(),
                    id,
                });
            }
            docs.push(document);
            Ok(())
        })
        .await
    }

    pub async fn update(&self, id: Uuid, document: T) -> StoreResult<()> {
        self.modify(|docs| match docs.iter_mut().find(|d| d.id() == id) {
            Some(slot) => {
                *slot = document;
                Ok(())
            }
            None => Err(self.not_found(id)),
        })
        .await
    }

    /// Insert the document, replacing any document with the same id
    pub async fn upsert(&self, document: T) -> StoreResult<()> {
        let id = document.id();
        self.modify(|docs| {
            match docs.iter_mut().find(|d| d.id() == id) {
                Some(slot) => *slot = document,
                None => docs.push(document),
            }
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.modify(|docs| {
            let before = docs.len();
            docs.retain(|d| d.id() != id);
            if docs.len() == before {
                Err(self.not_found(id))
            } else {
                Ok(())
            }
        })
        .await
    }

    /// Delete every document matching `predicate`, returning how many went
    pub async fn delete_where(&self, predicate: impl Fn(&T) -> bool) -> StoreResult<usize> {
        self.modify(|docs| {
            let before = docs.len();
            docs.retain(|d| !predicate(d));
            Ok(before - docs.len())
        })
        .await
    }

    /// Apply `change` to a copy of the documents, persist it, then publish it.
    ///
    /// The change is flushed in a single write; if `change` or the flush
    /// fails, the collection is left exactly as it was.
    pub async fn modify<R>(
        &self,
        change: impl FnOnce(&mut Vec<T>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut documents = self.documents.write().await;
        let mut updated = documents.clone();
        let result = change(&mut updated)?;
        if let Some(path) = &self.path {
            save_documents(path, &updated)?;
            debug!(
                collection = %self.name,
                documents = updated.len(),
                "Collection flushed to disk"
            );
        }
        *documents = updated;
        Ok(result)
    }

    fn not_found(&self, id: Uuid) -> StoreError {
        StoreError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }
}

fn load_documents<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&data)?)
}

fn save_documents<T: Serialize>(path: &Path, documents: &[T]) -> StoreResult<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    };

    let json = serde_json::to_vec_pretty(documents)?;

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(io_err(&temp_path))?;
    file.write_all(&json).map_err(io_err(&temp_path))?;
    file.sync_all().map_err(io_err(&temp_path))?;

    std::fs::rename(&temp_path, path).map_err(io_err(path))?;
    Ok(())
}
