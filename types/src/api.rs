//! JSON payloads for the experiment API.
//!
//! Requests are POSTed as JSON; absent rows come back as the empty object `{}`
//! rather than an HTTP error, so callers probe replies with [`is_empty_reply`]
//! before decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Answer, ResponseRecord};

/// Lookup keyed by participant (`check_responses`, `check_strategy`,
/// `check_survey`, `create_user`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerQuery {
    pub worker_id: String,
}

/// `check_workers`: reports the summed bonus while fetching the completion
/// token, so one round trip both reads and records it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusReport {
    pub worker_id: String,
    pub bonus: f64,
}

/// `update_strategy` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyUpdate {
    pub worker_id: String,
    pub condition: String,
    pub strategy: String,
}

/// `update_survey` request body: the worker id plus one or more numeracy items
/// keyed by item number.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyUpdate {
    pub worker_id: String,
    #[serde(flatten)]
    pub answers: BTreeMap<String, Answer>,
}

/// Generic acknowledgement for update endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// `check_responses` reply: every stored trial for the worker, keyed by trial
/// identifier.
pub type ResponsesReply = BTreeMap<String, ResponseRecord>;

/// `create_user` reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReply {
    pub worker_id: String,
    pub token: String,
}

/// True when a reply denotes an absent row: `{}`, `null`, or `false`.
pub fn is_empty_reply(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
