//! Trial settlement.
//!
//! The participant wagers `bet` out of `budget`. The unwagered remainder is
//! kept at a flat 25% tax. On a win the bet pays out at fair odds
//! (`bet / ground_truth`) and the inflated amount passes through the tiered
//! schedule; on a loss the wager is gone and the payout is the kept funds
//! alone.

use rand::Rng;
use thiserror::Error;

use crate::money::round_cent;
use crate::outcome::outcome;
use crate::tax::tiered_tax;

/// Flat tax applied to the unwagered portion of the budget.
pub const FLAT_TAX_RATE: f64 = 0.25;

#[derive(Debug, Error, PartialEq)]
pub enum PayoutError {
    /// Ground-truth odds of zero would inflate the bet to infinity; odds are a
    /// stimulus parameter, so this is a contract violation, not user input.
    #[error("win odds must be in (0, 1], got {odds}")]
    InvalidOdds { odds: f64 },
}

/// Settled trial economics, all values in dollars rounded to the cent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Payout {
    pub bet: f64,
    /// Unwagered budget after the flat tax.
    pub keep: f64,
    /// After-tax winnings; zero on a loss.
    pub win: f64,
    pub won: bool,
    /// Final payout: `keep + win`.
    pub pay: f64,
}

/// Settle a trial with a known outcome. Bet bounds are enforced upstream by
/// the validation layer; they are only debug-asserted here.
pub fn settle(bet: f64, budget: f64, ground_truth: f64, won: bool) -> Result<Payout, PayoutError> {
    if !(ground_truth > 0.0 && ground_truth <= 1.0) {
        return Err(PayoutError::InvalidOdds { odds: ground_truth });
    }
    debug_assert!(
        (0.0..=budget).contains(&bet),
        "bet {bet} outside [0, {budget}]"
    );

    let keep = round_cent((budget - bet) * (1.0 - FLAT_TAX_RATE));
    let win = if won { tiered_tax(bet / ground_truth) } else { 0.0 };

    Ok(Payout {
        bet: round_cent(bet),
        keep,
        win,
        won,
        pay: round_cent(keep + win),
    })
}

/// Draw the trial outcome from the stimulus odds, then settle.
pub fn compute_payout(
    bet: f64,
    budget: f64,
    ground_truth: f64,
    rng: &mut impl Rng,
) -> Result<Payout, PayoutError> {
    if !(ground_truth > 0.0 && ground_truth <= 1.0) {
        // Checked before the draw so an invalid stimulus never consumes RNG state.
        return Err(PayoutError::InvalidOdds { odds: ground_truth });
    }
    settle(bet, budget, ground_truth, outcome(ground_truth, rng))
}
