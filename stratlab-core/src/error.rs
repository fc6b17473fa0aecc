//! Error type shared by every engine in the core crate.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by indicator computation, strategy construction and the
/// backtest loop.
///
/// Sentiment collaborator failures are deliberately absent: they never reach
/// the caller and are handled inside the AI-enhanced strategy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid parameter '{param}': {reason}")]
    ParameterValidation { param: String, reason: String },

    #[error("insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("bar {index} is out of order: {current} does not follow {previous}")]
    DataOrdering {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("bar {index} is invalid: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("backtest cancelled at bar {bar_index}")]
    Cancelled { bar_index: usize },
}

impl CoreError {
    pub(crate) fn param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParameterValidation {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_minimum() {
        let err = CoreError::InsufficientData {
            required: 15,
            actual: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 15 bars, got 5"
        );
    }

    #[test]
    fn param_helper_builds_validation_error() {
        let err = CoreError::param("period", "must be >= 1");
        assert!(matches!(err, CoreError::ParameterValidation { .. }));
        assert!(err.to_string().contains("period"));
    }
}
