//! Record store abstraction.
//!
//! Persisted state is a tree of JSON records addressed by slash-separated
//! paths (see `betvis_types::path`). Two adapters implement the capability: an
//! in-memory store used by the service, tests, and the simulator, and a REST
//! adapter that forwards to a running service. Backend selection is a
//! configuration concern; callers only see [`RecordStore`].

pub mod memory;
pub mod rest;
mod upsert;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use upsert::ResponseWriter;

use betvis_types::PAY_PENDING;

/// Backend selection, typically injected with the rest of the page
/// environment. The session code is adapter-agnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Embedded store (tests, simulation, single-process deployments).
    Memory,
    /// A running betvis service.
    #[serde(rename_all = "camelCase")]
    Rest { base_url: String },
}

impl BackendConfig {
    pub fn open(&self) -> Result<Arc<dyn RecordStore>, StoreError> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            BackendConfig::Rest { base_url } => Ok(Arc::new(RestStore::new(base_url)?)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request failed with status {status}")]
    Http { status: reqwest::StatusCode },
    #[error("invalid record data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid store url: {0}")]
    Url(#[from] url::ParseError),
}

/// Mutability condition attached to a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteGuard {
    /// Unconditional create-or-merge (session test mode).
    None,
    /// Write only while the stored record has no finalized `pay`.
    IfMutable,
}

/// What a guarded upsert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Merged,
    /// The stored record is finalized; the write was dropped.
    Frozen,
}

/// Lifecycle state of a response record, derived from its stored `pay` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    Absent,
    Mutable,
    Final,
}

impl RecordState {
    pub fn classify(existing: Option<&Value>) -> Self {
        let record = match existing {
            None => return RecordState::Absent,
            Some(record) => record,
        };
        match record.get("pay").and_then(Value::as_f64) {
            Some(pay) if pay != PAY_PENDING => RecordState::Final,
            _ => RecordState::Mutable,
        }
    }
}

/// Shallow-merge `partial` into `existing`: object keys overwrite, unspecified
/// keys are untouched, and non-object values replace wholesale.
pub fn merge_record(existing: &mut Value, partial: Value) {
    match (existing, partial) {
        (Value::Object(existing), Value::Object(partial)) => {
            for (key, value) in partial {
                existing.insert(key, value);
            }
        }
        (existing, partial) => *existing = partial,
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record at `path`, or `None` when absent.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Write a fresh record at `path`.
    async fn create(&self, path: &str, record: Value) -> Result<(), StoreError>;

    /// Shallow-merge `partial` into the record at `path`.
    async fn merge(&self, path: &str, partial: Value) -> Result<(), StoreError>;

    /// Create-or-merge with a mutability guard.
    ///
    /// This default is a read-then-write sequence and is not atomic against a
    /// concurrent writer on the same key; adapters able to hold the check and
    /// the write together (or delegate to a backend that can) override it.
    async fn upsert(
        &self,
        path: &str,
        record: Value,
        guard: WriteGuard,
    ) -> Result<UpsertOutcome, StoreError> {
        match RecordState::classify(self.read(path).await?.as_ref()) {
            RecordState::Absent => {
                self.create(path, record).await?;
                Ok(UpsertOutcome::Created)
            }
            RecordState::Final if guard == WriteGuard::IfMutable => Ok(UpsertOutcome::Frozen),
            RecordState::Mutable | RecordState::Final => {
                self.merge(path, record).await?;
                Ok(UpsertOutcome::Merged)
            }
        }
    }
}
