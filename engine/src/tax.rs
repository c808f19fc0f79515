//! Tiered marginal tax on simulated winnings.
//!
//! Winnings are taxed bracket by bracket: the slice of money falling in tier
//! `i` keeps `RETAINED[i]` of its value, brackets below the total always fill
//! first, and the top bracket is open-ended. Kept (unwagered) funds are taxed
//! separately at a flat rate by the payout engine.

use crate::money::round_cent;

/// Lower bound of each tax bracket, in dollars.
const TIER_FLOORS: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];

/// Fraction of the bracket's money the participant keeps (tax rates 10%..50%).
const RETAINED: [f64; 5] = [0.9, 0.8, 0.7, 0.6, 0.5];

/// Every bracket except the open-ended top one spans exactly this much.
const TIER_WIDTH: f64 = 0.5;

/// Apply the tiered tax schedule and return the after-tax winnings, rounded to
/// the nearest cent. Non-positive winnings tax to zero.
pub fn tiered_tax(winnings: f64) -> f64 {
    let mut taxed = 0.0;
    for (floor, retained) in TIER_FLOORS.iter().zip(RETAINED) {
        let in_tier = winnings - floor;
        if in_tier <= 0.0 {
            break;
        }
        taxed += in_tier.min(TIER_WIDTH) * retained;
    }
    round_cent(taxed)
}
