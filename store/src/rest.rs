//! REST adapter.
//!
//! Forwards record operations to a running betvis service over its
//! `/api/store/*` endpoints. The guarded upsert travels with its guard so the
//! service applies the mutability check atomically against its own store;
//! this adapter never falls back to a client-side read-then-write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{RecordStore, StoreError, UpsertOutcome, WriteGuard};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadRequest {
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub record: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub path: String,
    pub record: Value,
    pub guard: WriteGuard,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadReply {
    pub record: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpsertReply {
    pub outcome: UpsertOutcome,
}

#[derive(Clone, Debug)]
pub struct RestStore {
    http: reqwest::Client,
    base: Url,
}

impl RestStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url)?,
        })
    }

    async fn post<Req: Serialize, Reply: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Reply, StoreError> {
        let url = self.base.join(endpoint)?;
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Http { status });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let reply: ReadReply = self
            .post(
                "api/store/read",
                &ReadRequest {
                    path: path.to_string(),
                },
            )
            .await?;
        Ok(reply.record)
    }

    async fn create(&self, path: &str, record: Value) -> Result<(), StoreError> {
        let _: Value = self
            .post(
                "api/store/create",
                &WriteRequest {
                    path: path.to_string(),
                    record,
                },
            )
            .await?;
        Ok(())
    }

    async fn merge(&self, path: &str, partial: Value) -> Result<(), StoreError> {
        let _: Value = self
            .post(
                "api/store/merge",
                &WriteRequest {
                    path: path.to_string(),
                    record: partial,
                },
            )
            .await?;
        Ok(())
    }

    async fn upsert(
        &self,
        path: &str,
        record: Value,
        guard: WriteGuard,
    ) -> Result<UpsertOutcome, StoreError> {
        let reply: UpsertReply = self
            .post(
                "api/store/upsert",
                &UpsertRequest {
                    path: path.to_string(),
                    record,
                    guard,
                },
            )
            .await?;
        Ok(reply.outcome)
    }
}
