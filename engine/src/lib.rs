//! Betvis payout engine.
//!
//! This crate contains the deterministic money logic (`settle`) and the
//! response validation layer used by the client and simulator.
//!
//! ## Determinism requirements
//! - All monetary values pass through [`round_cent`] before they are persisted
//!   or compared.
//! - Randomness is never drawn internally; the outcome draw takes the caller's
//!   `Rng` so tests and replays can force results.

pub mod validate;

mod money;
mod outcome;
mod payout;
mod tax;

pub use money::round_cent;
pub use outcome::outcome;
pub use payout::{compute_payout, settle, Payout, PayoutError, FLAT_TAX_RATE};
pub use tax::tiered_tax;
pub use validate::{
    bet_cents_constraint, bet_dollars_constraint, check_numeracy, estimate_constraint,
    numeracy_constraint, validate, validate_answer, Constraint, FieldKind, SurveyDefect,
    ValidationError,
};
