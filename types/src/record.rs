use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Sentinel for a field the participant has not answered yet.
pub const NO_RESPONSE: f64 = -1.0;

/// Sentinel for a payout that has not been finalized yet. Once `pay` moves off
/// this value the response record is immutable.
pub const PAY_PENDING: f64 = -1.0;

/// Trial identifier. The practice trial is never scored and is excluded from
/// bonus totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trial {
    Practice,
    Index(u32),
}

impl Trial {
    pub fn is_practice(&self) -> bool {
        matches!(self, Trial::Practice)
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trial::Practice => write!(f, "practice"),
            Trial::Index(idx) => write!(f, "{idx}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid trial identifier: {0:?}")]
pub struct TrialParseError(pub String);

impl std::str::FromStr for Trial {
    type Err = TrialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "practice" {
            return Ok(Trial::Practice);
        }
        s.parse::<u32>()
            .map(Trial::Index)
            .map_err(|_| TrialParseError(s.to_string()))
    }
}

// Serialized as the string "practice" or a bare number, matching the page
// environment and the stored JSON.
impl Serialize for Trial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Trial::Practice => serializer.serialize_str("practice"),
            Trial::Index(idx) => serializer.serialize_u32(*idx),
        }
    }
}

impl<'de> Deserialize<'de> for Trial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TrialVisitor;

        impl de::Visitor<'_> for TrialVisitor {
            type Value = Trial;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"practice\", a trial index, or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Trial, E> {
                u32::try_from(v)
                    .map(Trial::Index)
                    .map_err(|_| E::custom(format!("trial index out of range: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Trial, E> {
                u32::try_from(v)
                    .map(Trial::Index)
                    .map_err(|_| E::custom(format!("trial index out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Trial, E> {
                v.parse().map_err(|_| E::custom(format!("invalid trial: {v:?}")))
            }
        }

        deserializer.deserialize_any(TrialVisitor)
    }
}

/// A survey or trial answer as stored: numeric when the input parsed, the raw
/// text otherwise. Unanswered numeric fields hold the [`NO_RESPONSE`] sentinel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(f64),
    Text(String),
}

impl Answer {
    pub fn none() -> Self {
        Answer::Number(NO_RESPONSE)
    }

    pub fn is_unanswered(&self) -> bool {
        matches!(self, Answer::Number(n) if *n == NO_RESPONSE)
    }

    /// The answered numeric value, if any. Text and the sentinel yield `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Answer::Number(n) if *n != NO_RESPONSE => Some(*n),
            _ => None,
        }
    }

    /// Fold raw field input the way the survey pages do: a number when the
    /// text parses, the raw text verbatim otherwise. Non-finite parses
    /// ("NaN", "inf") stay text; the stored JSON only ever holds real values.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Answer::Number(n),
            _ => Answer::Text(raw.to_string()),
        }
    }
}

impl Default for Answer {
    fn default() -> Self {
        Answer::none()
    }
}

impl From<f64> for Answer {
    fn from(value: f64) -> Self {
        Answer::Number(value)
    }
}

/// One participant response per trial. Created on the first interaction with a
/// trial's inputs and merged on every subsequent edit until `pay` is finalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub worker_id: String,
    pub condition: String,
    pub trial: Trial,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_idx: Option<u32>,
    pub ground_truth: f64,
    pub sd_diff: f64,
    /// Probability estimate, reported on a 0-100 scale.
    #[serde(default)]
    pub cles: Answer,
    /// Bet in dollars.
    #[serde(default)]
    pub bet: Answer,
    #[serde(default = "default_pay")]
    pub pay: f64,
}

fn default_pay() -> f64 {
    PAY_PENDING
}

impl ResponseRecord {
    /// Fresh draft with both answers unanswered and the payout pending.
    pub fn draft(
        worker_id: impl Into<String>,
        condition: impl Into<String>,
        trial: Trial,
        trial_idx: Option<u32>,
        ground_truth: f64,
        sd_diff: f64,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            condition: condition.into(),
            trial,
            trial_idx,
            ground_truth,
            sd_diff,
            cles: Answer::none(),
            bet: Answer::none(),
            pay: PAY_PENDING,
        }
    }

    /// Finalized records are immutable outside test mode.
    pub fn is_final(&self) -> bool {
        self.pay != PAY_PENDING
    }
}

/// One row per participant, provisioned before the session starts. `bonus`
/// accumulates `pay` across non-practice trials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub worker_id: String,
    /// Completion credential surfaced on the final page.
    pub token: String,
    #[serde(default)]
    pub bonus: f64,
}
