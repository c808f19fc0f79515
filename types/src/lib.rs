//! Common types for the betvis experiment platform.
//!
//! Defines the participant/trial/survey records, the JSON API payloads, the
//! record-store path layout, and the experiment constants shared by the engine,
//! store, client, and service crates.

pub mod api;
pub mod constants;
pub mod path;
mod record;

pub use record::{
    Answer, ResponseRecord, Trial, TrialParseError, WorkerRecord, NO_RESPONSE, PAY_PENDING,
};

use std::collections::BTreeMap;

/// Numeracy survey answers keyed by item number (`"1"`..`"11"`).
pub type NumeracyAnswers = BTreeMap<String, Answer>;
