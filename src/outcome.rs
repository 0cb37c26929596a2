//! Step outcomes, used both as expectations and as observations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::messages;

/// The visible result of one action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The action's confirmation text appeared.
    #[default]
    Success,
    /// A validation message appeared.
    ValidationError(String),
    /// The name was refused as already taken.
    DuplicateError,
    /// As an expectation: accept anything and record it.
    /// As an observation: nothing recognisable appeared in time.
    Unknown,
}

impl Outcome {
    /// Builds an expectation from the `expected_result` / `expected_error`
    /// pair used by test-case documents.
    pub fn from_expectation(result: Option<&str>, error: Option<&str>) -> Self {
        if let Some(error) = error.map(str::trim).filter(|e| !e.is_empty()) {
            if error.eq_ignore_ascii_case(messages::ALREADY_EXISTS) {
                return Outcome::DuplicateError;
            }
            return Outcome::ValidationError(error.to_string());
        }
        match result {
            Some(r) if r.to_lowercase().contains("success") => Outcome::Success,
            Some(r) if r.trim().eq_ignore_ascii_case(messages::ALREADY_EXISTS) => {
                Outcome::DuplicateError
            }
            _ => Outcome::Unknown,
        }
    }

    /// Whether an observation satisfies this expectation.
    ///
    /// Validation messages match when the observed text contains the
    /// expected one, the way a visible-text lookup does.
    pub fn accepts(&self, observed: &Outcome) -> bool {
        match (self, observed) {
            (Outcome::Unknown, _) => true,
            (Outcome::ValidationError(want), Outcome::ValidationError(got)) => {
                got.contains(want.as_str())
            }
            (want, got) => want == got,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::ValidationError(msg) => write!(f, "validation error \"{}\"", msg),
            Outcome::DuplicateError => write!(f, "\"{}\" error", messages::ALREADY_EXISTS),
            Outcome::Unknown => write!(f, "no recognisable outcome"),
        }
    }
}

/// A text whose appearance signals a particular outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub outcome: Outcome,
}

impl Candidate {
    pub fn new(text: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }

    /// The confirmation text for a successful action.
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, Outcome::Success)
    }

    /// A validation message.
    pub fn validation(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(text.clone(), Outcome::ValidationError(text))
    }

    /// The duplicate-name message.
    pub fn duplicate() -> Self {
        Self::new(messages::ALREADY_EXISTS, Outcome::DuplicateError)
    }
}
