//! Participant session SDK.
//!
//! Everything a survey page needs: the trial session (draft record, live
//! validation, payout finalization), the experiment API client, and the
//! pre-navigation gates for the strategy and numeracy pages. All state lives
//! in an explicit [`Session`]/[`ApiClient`] rather than module globals, and
//! the backing store is chosen by configuration (in-memory or REST).

pub mod api;
pub mod gate;
pub mod session;

pub use api::ApiClient;
pub use gate::{strategy_gate, survey_gate, Gate};
pub use session::{complete, total_bonus, Completion, Session, SessionConfig, Stimulus};

pub use betvis_store::BackendConfig;

use betvis_engine::{PayoutError, ValidationError};
use betvis_store::StoreError;
use thiserror::Error;

/// Error type for session operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request failed with status {status}")]
    Failed { status: reqwest::StatusCode },
    #[error("invalid data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    #[error("invalid {field} response: {reason}")]
    Validation {
        field: &'static str,
        reason: ValidationError,
    },
    #[error("trial already finalized")]
    TrialFinalized,
    #[error(transparent)]
    Payout(#[from] PayoutError),
    /// The worker id has no row in the database; surfaced on the final page as
    /// "not logged in our database".
    #[error("worker {worker_id} is not logged in our database")]
    NotRegistered { worker_id: String },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use betvis_engine::round_cent;
    use betvis_store::RecordStore;
    use betvis_types::constants::NUMERACY_ITEMS;
    use betvis_types::Trial;

    struct TestContext {
        base_url: String,
        _server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestContext {
        async fn new() -> Self {
            let app = betvis_service::router(betvis_service::AppState::new());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind ephemeral port");
            let addr = listener.local_addr().expect("listener addr");
            let server_handle = tokio::spawn(async move {
                axum::serve(listener, app).await.expect("serve");
            });
            Self {
                base_url: format!("http://{addr}"),
                _server_handle: server_handle,
            }
        }
    }

    fn make_config(trial: Trial, trial_idx: Option<u32>) -> SessionConfig {
        SessionConfig {
            worker_id: "w1".to_string(),
            condition: "HOPs".to_string(),
            trial,
            trial_idx,
            budget: 0.5,
            test_mode: false,
        }
    }

    async fn run_trial(
        store: Arc<dyn RecordStore>,
        trial: Trial,
        trial_idx: Option<u32>,
        estimate: &str,
        bet_cents: &str,
        rng: &mut ChaCha8Rng,
    ) -> f64 {
        let mut session = Session::new(make_config(trial, trial_idx), store).unwrap();
        session.set_estimate(estimate).await;
        session.set_bet_cents(bet_cents).await;
        let payout = session.finalize(rng).await.unwrap();
        payout.pay
    }

    #[tokio::test]
    async fn test_full_session_against_service() {
        let ctx = TestContext::new().await;
        let api = ApiClient::new(&ctx.base_url).unwrap();
        api.create_user("w1").await.unwrap();

        let store = BackendConfig::Rest {
            base_url: ctx.base_url.clone(),
        }
        .open()
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);

        // Practice trial plus two scored trials.
        let practice_pay =
            run_trial(Arc::clone(&store), Trial::Practice, None, "40", "25", &mut rng).await;
        let pay_a =
            run_trial(Arc::clone(&store), Trial::Index(0), Some(0), "10", "10", &mut rng).await;
        let pay_b =
            run_trial(Arc::clone(&store), Trial::Index(1), Some(14), "70", "50", &mut rng).await;
        assert!(practice_pay >= 0.0);

        let completion = complete(&api, "w1").await.unwrap();
        assert_eq!(completion.bonus, round_cent(pay_a + pay_b));
        assert_eq!(completion.token.len(), 16);
    }

    #[tokio::test]
    async fn test_unregistered_worker_surfaces_missing_row() {
        let ctx = TestContext::new().await;
        let api = ApiClient::new(&ctx.base_url).unwrap();
        let err = complete(&api, "ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotRegistered { .. }));
    }

    #[tokio::test]
    async fn test_finalized_trial_survives_stale_rewrite() {
        let ctx = TestContext::new().await;
        let api = ApiClient::new(&ctx.base_url).unwrap();
        api.create_user("w1").await.unwrap();

        let store = BackendConfig::Rest {
            base_url: ctx.base_url.clone(),
        }
        .open()
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pay = run_trial(
            Arc::clone(&store),
            Trial::Index(0),
            Some(0),
            "40",
            "25",
            &mut rng,
        )
        .await;

        // A reloaded tab re-runs the same trial from scratch; its writes must
        // not disturb the finalized record.
        let mut session =
            Session::new(make_config(Trial::Index(0), Some(0)), Arc::clone(&store)).unwrap();
        session.set_estimate("99").await;
        session.set_bet_cents("1").await;

        let stored = store.read("responses/w1/0").await.unwrap().unwrap();
        assert_eq!(stored["pay"], pay);
        assert_eq!(stored["cles"], 40.0);
    }

    #[tokio::test]
    async fn test_strategy_gate_blocks_then_passes() {
        let ctx = TestContext::new().await;
        let api = ApiClient::new(&ctx.base_url).unwrap();
        api.create_user("w1").await.unwrap();

        let gate = strategy_gate(&api, "w1").await.unwrap();
        assert!(!gate.passed());

        api.update_strategy("w1", "HOPs", "always bet the odds")
            .await
            .unwrap();
        let gate = strategy_gate(&api, "w1").await.unwrap();
        assert!(gate.passed());
    }

    #[tokio::test]
    async fn test_survey_gate_reports_defective_items() {
        let ctx = TestContext::new().await;
        let api = ApiClient::new(&ctx.base_url).unwrap();
        api.create_user("w1").await.unwrap();

        let gate = survey_gate(&api, "w1").await.unwrap();
        assert!(!gate.passed());

        for item in 1..=NUMERACY_ITEMS {
            api.update_survey_answer("w1", item, "50").await.unwrap();
        }
        // Push one answer out of range; the gate must call it out.
        api.update_survey_answer("w1", 11, "99999").await.unwrap();
        match survey_gate(&api, "w1").await.unwrap() {
            Gate::Blocked(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("question 11"), "{messages:?}");
            }
            Gate::Pass => panic!("expected blocked gate"),
        }

        api.update_survey_answer("w1", 11, "5000").await.unwrap();
        assert!(survey_gate(&api, "w1").await.unwrap().passed());
    }
}
