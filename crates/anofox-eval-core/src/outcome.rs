//! Per-entity results that may be missing.

use crate::error::EvalError;

/// Why an entity has no value for a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// The series is too short for the requested computation.
    InsufficientSamples { needed: usize, got: usize },
    /// The statistic is not defined for this series (e.g. zero variance).
    Undefined,
    /// The entity has no counterpart in a joined panel.
    Unmatched,
}

/// A per-entity scalar: either a value or the reason it is missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Value(f64),
    Missing(MissingReason),
}

impl Outcome {
    /// Wrap a float, mapping non-finite results to `Missing(Undefined)`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Outcome::Value(value)
        } else {
            Outcome::Missing(MissingReason::Undefined)
        }
    }

    /// Convert a primitive's result into an outcome.
    ///
    /// `InsufficientData` becomes `Missing(InsufficientSamples)`; any other
    /// error is returned unchanged so callers can still fail fast on it.
    pub fn from_result(result: crate::Result<f64>) -> crate::Result<Self> {
        match result {
            Ok(v) => Ok(Outcome::from_f64(v)),
            Err(EvalError::InsufficientData { needed, got }) => Ok(Outcome::Missing(
                MissingReason::InsufficientSamples { needed, got },
            )),
            Err(e) => Err(e),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Outcome::Value(v) => Some(*v),
            Outcome::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Outcome::Missing(_))
    }

    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Missing(reason) => Some(*reason),
        }
    }

    pub(crate) fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Outcome::Value(v) => Outcome::from_f64(f(v)),
            missing => missing,
        }
    }
}
