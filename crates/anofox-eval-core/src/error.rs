//! Error types for panel diagnostics and ranking.

use thiserror::Error;

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types for evaluation operations.
///
/// Parameter and schema errors abort the whole call. Per-entity numerical
/// problems are not errors at this level: the engines report them as
/// [`crate::outcome::Outcome::Missing`] so the rest of the batch survives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Unknown sort criterion: {0}")]
    UnknownSortCriterion(String),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Join mismatch: entity {entity} is not present in y_true")]
    JoinMismatch { entity: String },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl EvalError {
    pub(crate) fn invalid_parameter(
        param: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        EvalError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
