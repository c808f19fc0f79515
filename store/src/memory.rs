//! In-memory record store.
//!
//! Backs the service and the simulator. Unlike the trait's default method,
//! [`MemoryStore::upsert`] holds the table lock across the mutability check
//! and the write, so a finalized record can never be clobbered by a racing
//! merge.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{merge_record, RecordState, RecordStore, StoreError, UpsertOutcome, WriteGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records under `prefix/`, keyed by the remaining path segment.
    /// Models the collection reads the backend offers (e.g. every trial of one
    /// worker).
    pub fn read_children(&self, prefix: &str) -> BTreeMap<String, Value> {
        let records = self.records.lock().expect("store lock poisoned");
        let prefix = format!("{prefix}/");
        records
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, value)| {
                let child = &path[prefix.len()..];
                // Only direct children; deeper paths belong to nested records.
                (!child.contains('/')).then(|| (child.to_string(), value.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let records = self.records.lock().expect("store lock poisoned");
        Ok(records.get(path).cloned())
    }

    async fn create(&self, path: &str, record: Value) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        records.insert(path.to_string(), record);
        Ok(())
    }

    async fn merge(&self, path: &str, partial: Value) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        match records.get_mut(path) {
            Some(existing) => merge_record(existing, partial),
            None => {
                records.insert(path.to_string(), partial);
            }
        }
        Ok(())
    }

    async fn upsert(
        &self,
        path: &str,
        record: Value,
        guard: WriteGuard,
    ) -> Result<UpsertOutcome, StoreError> {
        // Check and write under one lock: the conditional write is atomic.
        let mut records = self.records.lock().expect("store lock poisoned");
        match RecordState::classify(records.get(path)) {
            RecordState::Absent => {
                records.insert(path.to_string(), record);
                Ok(UpsertOutcome::Created)
            }
            RecordState::Final if guard == WriteGuard::IfMutable => Ok(UpsertOutcome::Frozen),
            RecordState::Mutable | RecordState::Final => {
                let existing = records.get_mut(path).expect("record classified as present");
                merge_record(existing, record);
                Ok(UpsertOutcome::Merged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_read_create_merge() {
        let store = MemoryStore::new();
        assert!(store.read("responses/w1/0").await.unwrap().is_none());

        store
            .create("responses/w1/0", json!({"cles": 40, "pay": -1.0}))
            .await
            .unwrap();
        store
            .merge("responses/w1/0", json!({"bet": 0.25}))
            .await
            .unwrap();

        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored, json!({"cles": 40, "bet": 0.25, "pay": -1.0}));
    }

    #[tokio::test]
    async fn test_guarded_upsert_freezes_finalized() {
        let store = MemoryStore::new();
        let outcome = store
            .upsert("responses/w1/0", json!({"pay": -1.0}), WriteGuard::IfMutable)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let outcome = store
            .upsert("responses/w1/0", json!({"pay": 0.85}), WriteGuard::IfMutable)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged);

        let outcome = store
            .upsert("responses/w1/0", json!({"pay": 0.10}), WriteGuard::IfMutable)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Frozen);
        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["pay"], 0.85);
    }

    #[tokio::test]
    async fn test_unguarded_upsert_overrides_finality() {
        let store = MemoryStore::new();
        store
            .upsert("responses/w1/0", json!({"pay": 0.85}), WriteGuard::IfMutable)
            .await
            .unwrap();
        let outcome = store
            .upsert("responses/w1/0", json!({"pay": 0.10}), WriteGuard::None)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged);
        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["pay"], 0.10);
    }

    #[tokio::test]
    async fn test_concurrent_writers_cannot_clobber_final() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert("responses/w1/3", json!({"pay": 0.85}), WriteGuard::IfMutable)
            .await
            .unwrap();

        // A reloaded tab racing stale merges against the finalized record.
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .upsert(
                        "responses/w1/3",
                        json!({"bet": 0.01 * i as f64, "pay": -1.0}),
                        WriteGuard::IfMutable,
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), UpsertOutcome::Frozen);
        }
        let stored = store.read("responses/w1/3").await.unwrap().unwrap();
        assert_eq!(stored["pay"], 0.85);
    }

    #[tokio::test]
    async fn test_read_children_scopes_to_direct_children() {
        let store = MemoryStore::new();
        store
            .create("responses/w1/practice", json!({"pay": 0.1}))
            .await
            .unwrap();
        store
            .create("responses/w1/0", json!({"pay": 0.2}))
            .await
            .unwrap();
        store
            .create("responses/w2/0", json!({"pay": 0.9}))
            .await
            .unwrap();
        store
            .create("survey/w1/numeracy", json!({"1": 500}))
            .await
            .unwrap();

        let children = store.read_children("responses/w1");
        assert_eq!(children.len(), 2);
        assert!(children.contains_key("practice"));
        assert!(children.contains_key("0"));

        // Nested numeracy record is not a direct child of `survey`.
        assert!(store.read_children("survey").is_empty());
    }
}
