//! Response validation.
//!
//! Every input field declares a [`Constraint`]; raw input is validated once
//! for live feedback and again over the stored [`Answer`]s before a trial can
//! finalize or the survey page can advance. Validation is advisory: the store
//! persists drafts verbatim (raw text included) and only finalization is
//! gated.

use thiserror::Error;

use betvis_types::constants::{NUMERACY_ITEMS, NUMERACY_MAX_RESPONSE};
use betvis_types::{Answer, NumeracyAnswers};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

/// Declared range constraint for one input field. Bounds are ignored for text
/// fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraint {
    pub kind: FieldKind,
    pub min: f64,
    pub max: f64,
}

impl Constraint {
    pub const fn numeric(min: f64, max: f64) -> Self {
        Self {
            kind: FieldKind::Numeric,
            min,
            max,
        }
    }

    pub const fn text() -> Self {
        Self {
            kind: FieldKind::Text,
            min: 0.0,
            max: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no response provided")]
    MissingResponse,
    #[error("response is not numeric")]
    NotNumeric,
    #[error("response outside [{min}, {max}]")]
    OutOfRange { min: f64, max: f64 },
}

/// Probability estimate, reported as "x out of 100".
pub fn estimate_constraint() -> Constraint {
    Constraint::numeric(0.0, 100.0)
}

/// Bet as entered, in whole cents out of the trial budget.
pub fn bet_cents_constraint(budget: f64) -> Constraint {
    Constraint::numeric(1.0, (budget * 100.0).round())
}

/// Bet as stored, in dollars.
pub fn bet_dollars_constraint(budget: f64) -> Constraint {
    Constraint::numeric(0.01, budget)
}

/// Constraint for numeracy item `1..=11`; `None` for unknown items.
pub fn numeracy_constraint(item: usize) -> Option<Constraint> {
    if (1..=NUMERACY_ITEMS).contains(&item) {
        Some(Constraint::numeric(0.0, NUMERACY_MAX_RESPONSE[item - 1]))
    } else {
        None
    }
}

/// Validate raw field input against its constraint.
pub fn validate(raw: &str, constraint: &Constraint) -> Result<Answer, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingResponse);
    }
    match constraint.kind {
        FieldKind::Text => Ok(Answer::Text(raw.to_string())),
        FieldKind::Numeric => {
            let value: f64 = trimmed
                .parse()
                .map_err(|_| ValidationError::NotNumeric)?;
            if value.is_nan() {
                return Err(ValidationError::NotNumeric);
            }
            if value < constraint.min || value > constraint.max {
                return Err(ValidationError::OutOfRange {
                    min: constraint.min,
                    max: constraint.max,
                });
            }
            Ok(Answer::Number(value))
        }
    }
}

/// Validate a stored answer against a numeric constraint, returning the value.
/// Used at submission time, where drafts may still hold raw text or the
/// no-response sentinel.
pub fn validate_answer(answer: &Answer, constraint: &Constraint) -> Result<f64, ValidationError> {
    match answer {
        Answer::Text(s) if s.trim().is_empty() => Err(ValidationError::MissingResponse),
        Answer::Text(_) => Err(ValidationError::NotNumeric),
        Answer::Number(_) if answer.is_unanswered() => Err(ValidationError::MissingResponse),
        Answer::Number(n) => {
            if *n < constraint.min || *n > constraint.max {
                Err(ValidationError::OutOfRange {
                    min: constraint.min,
                    max: constraint.max,
                })
            } else {
                Ok(*n)
            }
        }
    }
}

/// One failed numeracy item in the stored survey.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurveyDefect {
    pub item: usize,
    pub reason: ValidationError,
}

/// Check the stored numeracy answers for completeness and range. Returns every
/// defective item so the caller can report them all; an answered `0` is valid
/// and out-of-range stored answers are rejected.
pub fn check_numeracy(answers: &NumeracyAnswers) -> Vec<SurveyDefect> {
    let mut defects = Vec::new();
    for item in 1..=NUMERACY_ITEMS {
        let constraint = match numeracy_constraint(item) {
            Some(c) => c,
            None => continue,
        };
        let reason = match answers.get(&item.to_string()) {
            None => Some(ValidationError::MissingResponse),
            Some(answer) => validate_answer(answer, &constraint).err(),
        };
        if let Some(reason) = reason {
            defects.push(SurveyDefect { item, reason });
        }
    }
    defects
}
