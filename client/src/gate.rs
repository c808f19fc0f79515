//! Pre-navigation gates.
//!
//! Each survey page checks the stored responses before letting the
//! participant advance; a failed gate carries the user-facing messages, which
//! the page shows transiently and auto-dismisses.

use betvis_engine::{check_numeracy, ValidationError};

use crate::{ApiClient, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    Pass,
    Blocked(Vec<String>),
}

impl Gate {
    pub fn passed(&self) -> bool {
        matches!(self, Gate::Pass)
    }
}

/// The strategy page advances only once a non-empty strategy is stored.
pub async fn strategy_gate(api: &ApiClient, worker_id: &str) -> Result<Gate> {
    match api.check_strategy(worker_id).await? {
        Some(strategy) if !strategy.trim().is_empty() => Ok(Gate::Pass),
        _ => Ok(Gate::Blocked(vec![
            "You have not submitted a response.".to_string(),
        ])),
    }
}

/// The numeracy page advances only once every item is answered in range.
pub async fn survey_gate(api: &ApiClient, worker_id: &str) -> Result<Gate> {
    let answers = match api.check_survey(worker_id).await? {
        Some(answers) => answers,
        None => {
            return Ok(Gate::Blocked(vec![
                "You have not submitted any responses.".to_string(),
            ]))
        }
    };

    let defects = check_numeracy(&answers);
    if defects.is_empty() {
        return Ok(Gate::Pass);
    }
    Ok(Gate::Blocked(
        defects
            .iter()
            .map(|defect| match defect.reason {
                ValidationError::MissingResponse => format!(
                    "You have not submitted a response for question {}.",
                    defect.item
                ),
                _ => format!(
                    "You have submitted an invalid response for question {}.",
                    defect.item
                ),
            })
            .collect(),
    ))
}
