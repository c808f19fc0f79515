//! Response persistence protocol.
//!
//! One writer per (worker, trial) key walks the record through
//! absent → mutable → final: the first write creates the record, edits merge
//! into it, and once `pay` is finalized further writes are dropped. Session
//! test mode lifts the finality guard for the whole session so stimuli can be
//! replayed against recorded data.

use std::sync::Arc;

use tracing::debug;

use betvis_types::{path, ResponseRecord};

use crate::{RecordStore, StoreError, UpsertOutcome, WriteGuard};

pub struct ResponseWriter {
    store: Arc<dyn RecordStore>,
    test_mode: bool,
}

impl ResponseWriter {
    pub fn new(store: Arc<dyn RecordStore>, test_mode: bool) -> Self {
        Self { store, test_mode }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Create or merge the trial record for `record`'s key.
    pub async fn upsert(&self, record: &ResponseRecord) -> Result<UpsertOutcome, StoreError> {
        let path = path::response(&record.worker_id, record.trial);
        let guard = if self.test_mode {
            WriteGuard::None
        } else {
            WriteGuard::IfMutable
        };
        let outcome = self
            .store
            .upsert(&path, serde_json::to_value(record)?, guard)
            .await?;
        debug!(%path, ?outcome, "response upsert");
        Ok(outcome)
    }
}
