//! Remote store adapter.
//!
//! The remote store speaks a generic CRUD protocol per collection
//! (`tasks`, `issues`, `sprints`, `epics`):
//! - `GET /{collection}?per_page=N` - list (bare array, `{records}` or `{data}`)
//! - `GET /{collection}/{id}` - fetch one record
//! - `POST /{collection}` - create
//! - `PUT /{collection}/{id}` - replace with the full record
//! - `DELETE /{collection}/{id}` - delete
//!
//! [`Transport`] is the raw JSON seam ([`HttpTransport`] in production,
//! [`MemoryTransport`] in tests). [`RemoteStore`] layers typed entities on top
//! and owns the record mapping in [`wire`].
//!
//! ## Read-merge-write
//!
//! The store cannot patch structured fields (arrays are opaque JSON strings),
//! so [`RemoteStore::update`] fetches the current record, merges the patch on
//! top and writes the whole record back. Two concurrent updates to the same
//! entity can therefore lose one side's change: last write wins on the full
//! record, not per field.

pub mod http;
pub mod memory;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpTransport;
pub use memory::{Call, MemoryTransport, Verb};
pub use wire::WireRecord;

/// Default page size requested when listing a collection.
pub const DEFAULT_PER_PAGE: u32 = 1000;

/// Errors reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network or connection failure (including 5xx responses)
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The record vanished between optimistic apply and confirmation
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// The store rejected the payload
    #[error("remote store rejected the request: {0}")]
    ValidationRejected(String),

    /// The response body could not be mapped to an entity
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Stable category name, suitable for logs and assertions.
    pub fn category(&self) -> &'static str {
        match self {
            RemoteError::Unavailable(_) => "remote_unavailable",
            RemoteError::NotFound { .. } => "not_found",
            RemoteError::ValidationRejected(_) => "validation_rejected",
            RemoteError::Decode(_) => "decode",
        }
    }
}

/// Raw CRUD access to the remote store.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List a collection. The body is returned as received.
    async fn list(&self, collection: &str, per_page: u32) -> Result<Value, RemoteError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Value, RemoteError>;

    async fn create(&self, collection: &str, body: Value) -> Result<Value, RemoteError>;

    /// Replace the stored record with `body`.
    async fn replace(&self, collection: &str, id: &str, body: Value) -> Result<Value, RemoteError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

/// Typed access to the four remote collections.
#[derive(Clone)]
pub struct RemoteStore {
    transport: Arc<dyn Transport>,
    per_page: u32,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl RemoteStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Set the page size used by `list`.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub async fn list<E: WireRecord>(&self) -> Result<Vec<E>, RemoteError> {
        let collection = E::KIND.collection();
        let body = self.transport.list(collection, self.per_page).await?;
        let records = wire::rows(body);
        tracing::debug!(collection, count = records.len(), "listed collection");
        records.into_iter().map(E::from_wire).collect()
    }

    pub async fn get<E: WireRecord>(&self, id: &str) -> Result<E, RemoteError> {
        let body = self.transport.get(E::KIND.collection(), id).await?;
        E::from_wire(body)
    }

    /// Create a record. The entity's local ID is not sent.
    pub async fn create<E: WireRecord>(&self, entity: &E) -> Result<E, RemoteError> {
        let body = self
            .transport
            .create(E::KIND.collection(), entity.to_wire())
            .await?;
        E::from_wire(body)
    }

    /// Read-merge-write partial update.
    pub async fn update<E: WireRecord>(&self, id: &str, patch: &E::Patch) -> Result<E, RemoteError> {
        let mut current = self.get::<E>(id).await?;
        current.apply(patch);
        self.replace(&current).await
    }

    /// Write the full record for `entity`.
    pub async fn replace<E: WireRecord>(&self, entity: &E) -> Result<E, RemoteError> {
        let body = self
            .transport
            .replace(E::KIND.collection(), entity.id(), entity.to_wire())
            .await?;
        E::from_wire(body)
    }

    pub async fn delete<E: WireRecord>(&self, id: &str) -> Result<(), RemoteError> {
        self.transport.delete(E::KIND.collection(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, TaskPatch, TaskStatus};
    use serde_json::json;

    fn store() -> (Arc<MemoryTransport>, RemoteStore) {
        let transport = Arc::new(MemoryTransport::new());
        let store = RemoteStore::new(transport.clone());
        (transport, store)
    }

    #[tokio::test]
    async fn test_update_merges_onto_remote_record() {
        let (transport, store) = store();
        let id = transport.insert(
            "tasks",
            json!({"title": "Remote title", "status": "new", "tags": "[\"api\"]"}),
        );

        let updated = store
            .update::<Task>(&id, &TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "Remote title");
        assert_eq!(updated.tags, vec!["api".to_string()]);
        assert_eq!(transport.count(Verb::Get, "tasks"), 1);
        assert_eq!(transport.count(Verb::Replace, "tasks"), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let (_transport, store) = store();
        let err = store
            .update::<Task>("404", &TaskPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[tokio::test]
    async fn test_list_unwraps_records() {
        let (transport, store) = store();
        transport.insert("tasks", json!({"title": "A"}));
        transport.insert("tasks", json!({"title": "B"}));

        let tasks = store.list::<Task>().await.unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
