//! Trial session and completion flow.
//!
//! A [`Session`] is the explicit per-page-load context: configuration, the
//! draft response record, and the store writer. Input handlers fold values
//! into the draft and push it remotely; draft writes swallow store failures
//! (the page stays usable and the next edit retries), while finalization
//! propagates them because a lost payout write must not go unnoticed.

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use betvis_engine::{
    bet_cents_constraint, bet_dollars_constraint, compute_payout, estimate_constraint, round_cent,
    validate, validate_answer, Payout, ValidationError,
};
use betvis_store::{RecordStore, ResponseWriter};
use betvis_types::api::ResponsesReply;
use betvis_types::constants::{
    DEFAULT_BUDGET, ODDS_LIST, PRACTICE_ODDS, PRACTICE_SD, SD_LIST,
};
use betvis_types::{Answer, ResponseRecord, Trial};

use crate::{ApiClient, Error, Result};

/// Page environment injected by the bootstrap layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub worker_id: String,
    pub condition: String,
    pub trial: Trial,
    #[serde(default)]
    pub trial_idx: Option<u32>,
    #[serde(default = "default_budget")]
    pub budget: f64,
    /// Lifts the finality guard for the whole session.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_budget() -> f64 {
    DEFAULT_BUDGET
}

/// Stimulus parameters for one trial.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stimulus {
    pub odds: f64,
    pub sd: f64,
}

impl SessionConfig {
    /// Resolve the stimulus from the trial identity. Scored trials index the
    /// counterbalanced odds/spread lists by `trial_idx` (falling back to the
    /// trial number when no separate index is threaded through).
    pub fn stimulus(&self) -> Result<Stimulus> {
        match self.trial {
            Trial::Practice => Ok(Stimulus {
                odds: PRACTICE_ODDS,
                sd: PRACTICE_SD,
            }),
            Trial::Index(trial) => {
                let idx = self.trial_idx.unwrap_or(trial) as usize;
                if idx >= ODDS_LIST.len() {
                    return Err(Error::InvalidConfig(format!(
                        "trial index {idx} outside the stimulus lists"
                    )));
                }
                Ok(Stimulus {
                    odds: ODDS_LIST[idx],
                    sd: SD_LIST[idx],
                })
            }
        }
    }
}

/// One participant's view of one trial.
pub struct Session {
    config: SessionConfig,
    writer: ResponseWriter,
    draft: ResponseRecord,
}

impl Session {
    pub fn new(config: SessionConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let stimulus = config.stimulus()?;
        let draft = ResponseRecord::draft(
            config.worker_id.clone(),
            config.condition.clone(),
            config.trial,
            config.trial_idx,
            stimulus.odds,
            stimulus.sd,
        );
        let writer = ResponseWriter::new(store, config.test_mode);
        Ok(Self {
            config,
            writer,
            draft,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn draft(&self) -> &ResponseRecord {
        &self.draft
    }

    /// Record the probability estimate ("x out of 100"). Returns the
    /// validation verdict for live feedback; the raw value is folded into the
    /// draft and pushed regardless, matching the draft-then-gate design.
    pub async fn set_estimate(&mut self, raw: &str) -> Option<ValidationError> {
        let verdict = validate(raw, &estimate_constraint()).err();
        self.draft.cles = Answer::from_raw(raw);
        self.push_draft().await;
        verdict
    }

    /// Record the bet, entered in whole cents and stored in dollars.
    pub async fn set_bet_cents(&mut self, raw: &str) -> Option<ValidationError> {
        let verdict = validate(raw, &bet_cents_constraint(self.config.budget)).err();
        self.draft.bet = match Answer::from_raw(raw) {
            Answer::Number(cents) => Answer::Number(round_cent(cents / 100.0)),
            text => text,
        };
        self.push_draft().await;
        verdict
    }

    async fn push_draft(&self) {
        // Draft writes are best-effort: log and keep the page alive.
        if let Err(error) = self.writer.upsert(&self.draft).await {
            warn!(%error, trial = %self.draft.trial, "failed to push draft response");
        }
    }

    /// Settle the trial: both responses must validate, then the outcome is
    /// drawn, the payout computed, and the finalized record persisted. After
    /// this the record is immutable and further edits are dropped.
    pub async fn finalize(&mut self, rng: &mut impl Rng) -> Result<Payout> {
        if self.draft.is_final() {
            return Err(Error::TrialFinalized);
        }
        validate_answer(&self.draft.cles, &estimate_constraint()).map_err(|reason| {
            Error::Validation {
                field: "estimate",
                reason,
            }
        })?;
        let bet = validate_answer(&self.draft.bet, &bet_dollars_constraint(self.config.budget))
            .map_err(|reason| Error::Validation {
                field: "bet",
                reason,
            })?;

        let payout = compute_payout(bet, self.config.budget, self.draft.ground_truth, rng)?;
        self.draft.pay = payout.pay;
        self.writer.upsert(&self.draft).await?;
        Ok(payout)
    }
}

/// Sum of finalized payouts across scored (non-practice) trials.
pub fn total_bonus(responses: &ResponsesReply) -> f64 {
    let sum = responses
        .iter()
        .filter(|(trial, _)| trial.as_str() != "practice")
        .filter(|(_, record)| record.is_final())
        .map(|(_, record)| record.pay)
        .sum();
    round_cent(sum)
}

/// Final-page result: completion token plus the recorded bonus.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub token: String,
    pub bonus: f64,
}

/// Total the worker's bonus, record it, and fetch the completion token.
pub async fn complete(api: &ApiClient, worker_id: &str) -> Result<Completion> {
    let responses = api.check_responses(worker_id).await?;
    let bonus = total_bonus(&responses);
    match api.check_workers(worker_id, bonus).await? {
        Some(worker) => Ok(Completion {
            token: worker.token,
            bonus,
        }),
        None => Err(Error::NotRegistered {
            worker_id: worker_id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use betvis_store::MemoryStore;
    use betvis_types::{PAY_PENDING, Trial};

    fn make_session(trial: Trial, trial_idx: Option<u32>) -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::new());
        let config = SessionConfig {
            worker_id: "w1".to_string(),
            condition: "HOPs".to_string(),
            trial,
            trial_idx,
            budget: 0.5,
            test_mode: false,
        };
        let session =
            Session::new(config, Arc::clone(&store) as Arc<dyn RecordStore>).unwrap();
        (store, session)
    }

    #[test]
    fn test_stimulus_resolution() {
        let config = SessionConfig {
            worker_id: "w1".to_string(),
            condition: "HOPs".to_string(),
            trial: Trial::Practice,
            trial_idx: None,
            budget: 0.5,
            test_mode: false,
        };
        assert_eq!(
            config.stimulus().unwrap(),
            Stimulus {
                odds: PRACTICE_ODDS,
                sd: PRACTICE_SD
            }
        );

        let scored = SessionConfig {
            trial: Trial::Index(2),
            trial_idx: Some(14),
            ..config.clone()
        };
        assert_eq!(
            scored.stimulus().unwrap(),
            Stimulus {
                odds: ODDS_LIST[14],
                sd: SD_LIST[14]
            }
        );

        // Without a separate counterbalancing index the trial number is used.
        let fallback = SessionConfig {
            trial: Trial::Index(3),
            trial_idx: None,
            ..config.clone()
        };
        assert_eq!(fallback.stimulus().unwrap().odds, ODDS_LIST[3]);

        let out_of_range = SessionConfig {
            trial: Trial::Index(2),
            trial_idx: Some(99),
            ..config
        };
        assert!(out_of_range.stimulus().is_err());
    }

    #[tokio::test]
    async fn test_estimate_verdicts_and_draft_storage() {
        let (store, mut session) = make_session(Trial::Index(0), Some(0));

        assert_eq!(session.set_estimate("40").await, None);
        assert!(matches!(
            session.set_estimate("abc").await,
            Some(ValidationError::NotNumeric)
        ));
        assert!(matches!(
            session.set_estimate("150").await,
            Some(ValidationError::OutOfRange { .. })
        ));

        // Out-of-range numerics are stored as numbers; unparseable input is
        // stored verbatim. Only finalization enforces the range.
        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["cles"], 150.0);
    }

    #[tokio::test]
    async fn test_bet_stored_in_dollars() {
        let (store, mut session) = make_session(Trial::Index(0), Some(0));
        assert_eq!(session.set_bet_cents("25").await, None);
        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["bet"], 0.25);

        assert!(matches!(
            session.set_bet_cents("0").await,
            Some(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            session.set_bet_cents("").await,
            Some(ValidationError::MissingResponse)
        ));
    }

    #[tokio::test]
    async fn test_finalize_requires_valid_responses() {
        let (_, mut session) = make_session(Trial::Index(0), Some(0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let err = session.finalize(&mut rng).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "estimate",
                reason: ValidationError::MissingResponse
            }
        ));

        session.set_estimate("40").await;
        let err = session.finalize(&mut rng).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "bet", .. }));
    }

    #[tokio::test]
    async fn test_finalize_persists_and_freezes() {
        let (store, mut session) = make_session(Trial::Index(0), Some(0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        session.set_estimate("40").await;
        session.set_bet_cents("25").await;
        let payout = session.finalize(&mut rng).await.unwrap();

        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["pay"], payout.pay);
        assert_ne!(stored["pay"], PAY_PENDING);

        // Double finalization is rejected locally.
        assert!(matches!(
            session.finalize(&mut rng).await,
            Err(Error::TrialFinalized)
        ));
        // And stale edits no longer reach the store.
        session.set_estimate("1").await;
        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["cles"], 40.0);
    }

    #[tokio::test]
    async fn test_practice_trial_finalizes_but_never_scores() {
        let (store, mut session) = make_session(Trial::Practice, None);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        session.set_estimate("40").await;
        session.set_bet_cents("25").await;
        session.finalize(&mut rng).await.unwrap();

        let stored = store.read("responses/w1/practice").await.unwrap().unwrap();
        let record: ResponseRecord = serde_json::from_value(stored).unwrap();
        let responses: ResponsesReply =
            [("practice".to_string(), record)].into_iter().collect();
        assert_eq!(total_bonus(&responses), 0.0);
    }

    #[test]
    fn test_total_bonus_skips_pending_trials() {
        let mut finalized = ResponseRecord::draft("w1", "HOPs", Trial::Index(0), Some(0), 0.4, 1.0);
        finalized.pay = 0.85;
        let pending = ResponseRecord::draft("w1", "HOPs", Trial::Index(1), Some(1), 0.4, 1.0);

        let responses: ResponsesReply = [
            ("0".to_string(), finalized),
            ("1".to_string(), pending),
        ]
        .into_iter()
        .collect();
        assert_eq!(total_bonus(&responses), 0.85);
    }
}
