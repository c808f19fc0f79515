//! Experiment backend.
//!
//! Serves the survey/experiment API consumed by participant sessions plus the
//! generic record endpoints used by the REST store adapter. Absent rows come
//! back as `{}` (not an HTTP error), matching the contract the session code
//! probes with `is_empty_reply`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use betvis_store::rest::{ReadReply, ReadRequest, UpsertReply, UpsertRequest, WriteRequest};
use betvis_store::{MemoryStore, RecordStore, StoreError};
use betvis_types::api::{Ack, BonusReport, CreateUserReply, StrategyUpdate, SurveyUpdate, WorkerQuery};
use betvis_types::constants::TOKEN_LENGTH;
use betvis_types::path;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Store failures surface as opaque 500s; the session code treats them as
/// non-fatal and stays in its prior state.
#[derive(Debug)]
pub struct ServiceError(StoreError);

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self(StoreError::Decode(err))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "store error").into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/check_responses", post(check_responses))
        .route("/api/check_workers", post(check_workers))
        .route("/api/update_strategy", post(update_strategy))
        .route("/api/update_survey", post(update_survey))
        .route("/api/check_strategy", post(check_strategy))
        .route("/api/check_survey", post(check_survey))
        .route("/api/create_user", post(create_user))
        .route("/api/store/read", post(store_read))
        .route("/api/store/create", post(store_create))
        .route("/api/store/merge", post(store_merge))
        .route("/api/store/upsert", post(store_upsert))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({"ok": true}))
}

/// Every stored trial for the worker, keyed by trial identifier.
async fn check_responses(
    State(state): State<AppState>,
    Json(query): Json<WorkerQuery>,
) -> Json<Value> {
    let trials = state.store.read_children(&path::responses(&query.worker_id));
    Json(Value::Object(Map::from_iter(trials)))
}

/// Record the reported bonus on the worker row and return it (token included);
/// `{}` when the worker was never provisioned.
async fn check_workers(
    State(state): State<AppState>,
    Json(report): Json<BonusReport>,
) -> Result<Json<Value>, ServiceError> {
    let worker_path = path::worker(&report.worker_id);
    if state.store.read(&worker_path).await?.is_none() {
        return Ok(Json(json!({})));
    }
    state
        .store
        .merge(&worker_path, json!({"bonus": report.bonus}))
        .await?;
    let record = state.store.read(&worker_path).await?.unwrap_or(json!({}));
    Ok(Json(record))
}

async fn update_strategy(
    State(state): State<AppState>,
    Json(update): Json<StrategyUpdate>,
) -> Result<Json<Ack>, ServiceError> {
    state
        .store
        .merge(
            &path::survey(&update.worker_id),
            serde_json::to_value(&update)?,
        )
        .await?;
    Ok(Json(Ack::ok()))
}

async fn update_survey(
    State(state): State<AppState>,
    Json(update): Json<SurveyUpdate>,
) -> Result<Json<Ack>, ServiceError> {
    state
        .store
        .merge(
            &path::numeracy(&update.worker_id),
            serde_json::to_value(&update.answers)?,
        )
        .await?;
    Ok(Json(Ack::ok()))
}

async fn check_strategy(
    State(state): State<AppState>,
    Json(query): Json<WorkerQuery>,
) -> Result<Json<Value>, ServiceError> {
    let record = state
        .store
        .read(&path::survey(&query.worker_id))
        .await?
        .unwrap_or(json!({}));
    Ok(Json(record))
}

async fn check_survey(
    State(state): State<AppState>,
    Json(query): Json<WorkerQuery>,
) -> Result<Json<Value>, ServiceError> {
    match state.store.read(&path::numeracy(&query.worker_id)).await? {
        Some(answers) => Ok(Json(json!({"numeracy": answers}))),
        None => Ok(Json(json!({}))),
    }
}

/// Provision a worker row with a fresh completion token. Idempotent: an
/// already-provisioned worker keeps its token.
async fn create_user(
    State(state): State<AppState>,
    Json(query): Json<WorkerQuery>,
) -> Result<Json<CreateUserReply>, ServiceError> {
    let worker_path = path::worker(&query.worker_id);
    if let Some(existing) = state.store.read(&worker_path).await? {
        if let Some(token) = existing.get("token").and_then(Value::as_str) {
            return Ok(Json(CreateUserReply {
                worker_id: query.worker_id,
                token: token.to_string(),
            }));
        }
    }

    let token = generate_token(&mut rand::thread_rng());
    state
        .store
        .create(
            &worker_path,
            json!({
                "workerId": query.worker_id,
                "token": token,
                "bonus": 0.0,
            }),
        )
        .await?;
    info!(worker_id = %query.worker_id, "provisioned worker");
    Ok(Json(CreateUserReply {
        worker_id: query.worker_id,
        token,
    }))
}

fn generate_token(rng: &mut impl Rng) -> String {
    const HEX: &[u8] = b"0123456789ABCDEF";
    (0..TOKEN_LENGTH)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

async fn store_read(
    State(state): State<AppState>,
    Json(request): Json<ReadRequest>,
) -> Result<Json<ReadReply>, ServiceError> {
    let record = state.store.read(&request.path).await?;
    Ok(Json(ReadReply { record }))
}

async fn store_create(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<Ack>, ServiceError> {
    state.store.create(&request.path, request.record).await?;
    Ok(Json(Ack::ok()))
}

async fn store_merge(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<Ack>, ServiceError> {
    state.store.merge(&request.path, request.record).await?;
    Ok(Json(Ack::ok()))
}

/// Guarded create-or-merge. The guard is applied against this process's
/// store under its lock, which is what makes the remote upsert atomic.
async fn store_upsert(
    State(state): State<AppState>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<UpsertReply>, ServiceError> {
    let outcome = state
        .store
        .upsert(&request.path, request.record, request.guard)
        .await?;
    Ok(Json(UpsertReply { outcome }))
}
