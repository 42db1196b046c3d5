//! Domain errors raised by the reranking pipeline.
//!
//! Everything else (backend load failures, inference failures) travels as
//! `anyhow::Error` and is never translated here. Callers that need to tell a
//! configuration problem apart from a model failure can
//! `downcast_ref::<RerankerError>()`.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RerankerError {
    /// Strategy preconditions are not met for the requested model.
    InvalidConfiguration { model_name: String, reason: String },
    /// The selected family has no model backend wired in.
    BackendUnavailable { family: String, model_name: String },
    /// A backend answered with the wrong number of scores.
    ScoreCountMismatch { expected: usize, actual: usize },
}

impl RerankerError {
    pub fn invalid_configuration(model_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            model_name: model_name.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RerankerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RerankerError::InvalidConfiguration { model_name, reason } => {
                write!(
                    f,
                    "configuration invalid for reranking with '{}': {}",
                    model_name, reason
                )
            }
            RerankerError::BackendUnavailable { family, model_name } => {
                write!(
                    f,
                    "no {} backend available to load '{}'",
                    family, model_name
                )
            }
            RerankerError::ScoreCountMismatch { expected, actual } => {
                write!(
                    f,
                    "backend returned {} scores for {} passages",
                    actual, expected
                )
            }
        }
    }
}

impl std::error::Error for RerankerError {}
