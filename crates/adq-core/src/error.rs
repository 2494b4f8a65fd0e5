//! Unified error types for the adq ecosystem.
//!
//! This module provides a common error type [`AdqError`] shared by the study
//! domain, the LP optimizer and the remote client, so errors can be handled
//! uniformly at API boundaries.

use std::fmt;

use thiserror::Error;

/// Invariant broken at study construction.
///
/// Carried inside [`AdqError::Validation`] so callers can match on the
/// failure class without parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A name already used in the same scope (node entity, link dest, converter source).
    Duplicate,
    /// Referenced network does not exist.
    MissingNetwork,
    /// Referenced node does not exist.
    MissingNode,
    /// A quantity, capacity, flow or max bound has a negative entry.
    Negative,
    /// Storage efficiency outside `[0, 1]`.
    Efficiency,
    /// Converter ratio not strictly positive.
    Ratio,
    /// Converter output missing or set twice.
    ConverterOutput,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValidationKind::Duplicate => "duplicate name",
            ValidationKind::MissingNetwork => "unknown network",
            ValidationKind::MissingNode => "unknown node",
            ValidationKind::Negative => "negative value",
            ValidationKind::Efficiency => "efficiency out of range",
            ValidationKind::Ratio => "ratio out of range",
            ValidationKind::ConverterOutput => "converter output",
        };
        f.write_str(label)
    }
}

/// Unified error type for all adq operations.
#[derive(Error, Debug)]
pub enum AdqError {
    /// Study invariant broken at insertion or during whole-study validation.
    #[error("validation error ({kind}): {detail}")]
    Validation {
        kind: ValidationKind,
        detail: String,
    },

    /// Raw numeric input whose shape matches none of the accepted layouts.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// LP backend refused to solve (infrastructure failure, never logical
    /// infeasibility: lost-load variables keep every model feasible).
    #[error("solver error: {0}")]
    Solver(String),

    /// JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Remote solve service failure (transport, auth or server side).
    #[error("remote error: {0}")]
    Remote(String),
}

/// Convenience alias for Results using [`AdqError`].
pub type AdqResult<T> = Result<T, AdqError>;

impl AdqError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        AdqError::Validation {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<serde_json::Error> for AdqError {
    fn from(err: serde_json::Error) -> Self {
        AdqError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdqError::validation(ValidationKind::Duplicate, "production 'oil' already exists");
        assert!(err.to_string().contains("duplicate name"));
        assert!(err.to_string().contains("oil"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
        let err: AdqError = json_err.into();
        assert!(matches!(err, AdqError::Serialization(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> AdqResult<()> {
            Err(AdqError::Solver("backend unavailable".into()))
        }

        fn outer() -> AdqResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
