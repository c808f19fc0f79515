//! Experiment API client.
//!
//! Thin JSON client for the survey/completion endpoints. Absent rows come
//! back as `{}` (or another falsy value), so replies are probed with
//! `is_empty_reply` before decoding into typed records.

use serde::Serialize;
use serde_json::Value;
use url::Url;

use betvis_types::api::{
    is_empty_reply, BonusReport, CreateUserReply, ResponsesReply, StrategyUpdate, SurveyUpdate,
    WorkerQuery,
};
use betvis_types::{Answer, NumeracyAnswers, WorkerRecord};

use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url)?,
        })
    }

    async fn post(&self, endpoint: &str, body: &impl Serialize) -> Result<Value> {
        let url = self.base.join(endpoint)?;
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Failed { status });
        }
        Ok(response.json().await?)
    }

    fn query(worker_id: &str) -> WorkerQuery {
        WorkerQuery {
            worker_id: worker_id.to_string(),
        }
    }

    /// All stored trials for the worker; empty map when none exist.
    pub async fn check_responses(&self, worker_id: &str) -> Result<ResponsesReply> {
        let reply = self
            .post("api/check_responses", &Self::query(worker_id))
            .await?;
        if is_empty_reply(&reply) {
            return Ok(ResponsesReply::new());
        }
        Ok(serde_json::from_value(reply)?)
    }

    /// Report the summed bonus and fetch the worker row; `None` when the
    /// worker was never provisioned.
    pub async fn check_workers(&self, worker_id: &str, bonus: f64) -> Result<Option<WorkerRecord>> {
        let reply = self
            .post(
                "api/check_workers",
                &BonusReport {
                    worker_id: worker_id.to_string(),
                    bonus,
                },
            )
            .await?;
        if is_empty_reply(&reply) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(reply)?))
    }

    pub async fn update_strategy(
        &self,
        worker_id: &str,
        condition: &str,
        strategy: &str,
    ) -> Result<()> {
        self.post(
            "api/update_strategy",
            &StrategyUpdate {
                worker_id: worker_id.to_string(),
                condition: condition.to_string(),
                strategy: strategy.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    /// Record one numeracy answer, folding raw input the way the survey page
    /// does (number when it parses, raw text otherwise).
    pub async fn update_survey_answer(
        &self,
        worker_id: &str,
        item: usize,
        raw: &str,
    ) -> Result<()> {
        self.post(
            "api/update_survey",
            &SurveyUpdate {
                worker_id: worker_id.to_string(),
                answers: [(item.to_string(), Answer::from_raw(raw))]
                    .into_iter()
                    .collect(),
            },
        )
        .await?;
        Ok(())
    }

    /// The stored strategy text, if any.
    pub async fn check_strategy(&self, worker_id: &str) -> Result<Option<String>> {
        let reply = self
            .post("api/check_strategy", &Self::query(worker_id))
            .await?;
        if is_empty_reply(&reply) {
            return Ok(None);
        }
        Ok(reply
            .get("strategy")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// The stored numeracy answers, if any.
    pub async fn check_survey(&self, worker_id: &str) -> Result<Option<NumeracyAnswers>> {
        let reply = self
            .post("api/check_survey", &Self::query(worker_id))
            .await?;
        if is_empty_reply(&reply) {
            return Ok(None);
        }
        match reply.get("numeracy") {
            Some(answers) => Ok(Some(serde_json::from_value(answers.clone())?)),
            None => Ok(None),
        }
    }

    /// Provision the worker row (idempotent).
    pub async fn create_user(&self, worker_id: &str) -> Result<CreateUserReply> {
        let reply = self.post("api/create_user", &Self::query(worker_id)).await?;
        Ok(serde_json::from_value(reply)?)
    }
}
