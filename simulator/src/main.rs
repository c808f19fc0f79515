//! Synthetic participant cohorts.
//!
//! Drives the real session/engine/store code with simulated participants to
//! sanity-check the economic design: given the tiered tax schedule, how much
//! of the per-trial budget does a cohort actually retain?

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use betvis_client::{total_bonus, Session, SessionConfig};
use betvis_engine::round_cent;
use betvis_store::{MemoryStore, RecordStore};
use betvis_types::api::ResponsesReply;
use betvis_types::constants::{DEFAULT_BUDGET, ODDS_LIST};
use betvis_types::Trial;

#[derive(Parser)]
#[command(name = "betvis-simulator", about = "Synthetic participant cohorts for betvis")]
struct Args {
    /// Number of simulated participants.
    #[arg(long, default_value_t = 200)]
    workers: usize,

    /// Scored trials per participant (capped by the stimulus lists).
    #[arg(long, default_value_t = ODDS_LIST.len())]
    trials: usize,

    /// Budget per trial, in dollars.
    #[arg(long, default_value_t = DEFAULT_BUDGET)]
    budget: f64,

    /// RNG seed for reproducible cohorts.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// A participant with miscalibrated beliefs: the reported estimate hovers
/// around the true odds, and the bet scales with confidence that their side
/// wins.
fn respond(odds: f64, budget: f64, rng: &mut impl Rng) -> (String, String) {
    let noise: f64 = rng.gen_range(-10.0..10.0);
    let estimate = (odds * 100.0 + noise).clamp(0.0, 100.0).round();

    let max_cents = (budget * 100.0).round();
    let confidence = (estimate / 100.0 - 0.5).abs() * 2.0;
    let cents = (1.0 + confidence * (max_cents - 1.0)).round().clamp(1.0, max_cents);

    (format!("{estimate}"), format!("{cents}"))
}

async fn run_worker(
    worker_id: &str,
    trials: usize,
    budget: f64,
    store: Arc<MemoryStore>,
    rng: &mut ChaCha8Rng,
) -> Result<f64> {
    let trial_ids = std::iter::once((Trial::Practice, None))
        .chain((0..trials as u32).map(|i| (Trial::Index(i), Some(i))));

    for (trial, trial_idx) in trial_ids {
        let config = SessionConfig {
            worker_id: worker_id.to_string(),
            condition: "sim".to_string(),
            trial,
            trial_idx,
            budget,
            test_mode: false,
        };
        let mut session =
            Session::new(config, Arc::clone(&store) as Arc<dyn RecordStore>)?;
        let odds = session.config().stimulus()?.odds;
        let (estimate, bet_cents) = respond(odds, budget, rng);
        session.set_estimate(&estimate).await;
        session.set_bet_cents(&bet_cents).await;
        let payout = session.finalize(rng).await?;
        debug!(worker_id, trial = %trial, pay = payout.pay, won = payout.won, "trial settled");
    }

    let responses: ResponsesReply = store
        .read_children(&betvis_types::path::responses(worker_id))
        .into_iter()
        .map(|(trial, value)| Ok((trial, serde_json::from_value(value)?)))
        .collect::<Result<_>>()?;
    Ok(total_bonus(&responses))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let trials = args.trials.min(ODDS_LIST.len());
    let store = Arc::new(MemoryStore::new());
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    info!(
        workers = args.workers,
        trials,
        budget = args.budget,
        seed = args.seed,
        "starting cohort"
    );

    let mut bonuses = Vec::with_capacity(args.workers);
    for w in 0..args.workers {
        let worker_id = format!("sim-{w:04}");
        let bonus = run_worker(&worker_id, trials, args.budget, Arc::clone(&store), &mut rng).await?;
        bonuses.push(bonus);
    }

    let total: f64 = bonuses.iter().sum();
    let mean_bonus = round_cent(total / args.workers as f64);
    let mean_pay = total / (args.workers * trials) as f64;
    let staked = args.budget * trials as f64;
    info!(
        mean_bonus,
        mean_pay_per_trial = round_cent(mean_pay),
        budget_retained_pct = (100.0 * mean_bonus / staked * 10.0).round() / 10.0,
        "cohort complete"
    );

    Ok(())
}
