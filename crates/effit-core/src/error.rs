//! Error types for effit

use thiserror::Error;

/// effit error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input: missing histograms or function, mismatched binning, k > n, bad settings.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error (sampler or optimizer failure)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_message() {
        let e = Error::Validation("histograms differ in bin count".to_string());
        assert_eq!(e.to_string(), "Validation error: histograms differ in bin count");
    }

    #[test]
    fn test_json_error_converts() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: Error = err.into();
        assert!(matches!(e, Error::Json(_)));
    }
}
