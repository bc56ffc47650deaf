//! Common error types for crowdcast

use thiserror::Error;

/// Common result type for crowdcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds raised by the transformation core
///
/// None of these are retried internally; retries belong to the network layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Sampling requested while no community histogram is available
    #[error("No predictions available: {0}")]
    Precondition(String),

    /// Samples arrived in a container the operation cannot accept
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Scale/format combination with no transform (e.g. logarithmic dates)
    #[error("Unsupported scale: {0}")]
    UnsupportedScale(String),

    /// Question type other than binary or continuous
    #[error("Unsupported question type: {0}")]
    UnsupportedQuestionType(String),

    /// Degenerate or non-finite numeric input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lookup of a question field that is not part of the typed model
    #[error("Unknown question field: {0}")]
    UnknownField(String),

    /// Malformed question data (timestamps, dates, scale bounds)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reject NaN and infinities with a descriptive `InvalidInput`
pub(crate) fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("{} must be finite, got {}", what, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_finite_accepts_regular_values() {
        assert_eq!(ensure_finite(1.5, "x").unwrap(), 1.5);
        assert_eq!(ensure_finite(-0.0, "x").unwrap(), 0.0);
    }

    #[test]
    fn test_ensure_finite_rejects_nan_and_inf() {
        assert!(matches!(ensure_finite(f64::NAN, "loc"), Err(Error::InvalidInput(_))));
        assert!(matches!(ensure_finite(f64::INFINITY, "loc"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_error_messages_name_the_kind() {
        let err = Error::Precondition("question 12".to_string());
        assert_eq!(err.to_string(), "No predictions available: question 12");
        let err = Error::TypeMismatch("expected dates".to_string());
        assert!(err.to_string().starts_with("Type mismatch"));
    }
}
