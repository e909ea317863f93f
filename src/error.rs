//! Error types for Quimera
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Quimera
#[derive(Debug, Error)]
pub enum QuimeraError {
    /// Invalid or missing input/configuration (fatal, never retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required external binary is not on PATH
    #[error("Required binary not installed: {0}")]
    MissingBinary(String),

    /// Contract metadata could not be fetched
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// Generation backend failed in a way that cannot be retried
    #[error("Generation error: {0}")]
    Generation(String),

    /// Sandbox test runner could not be driven
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Template registration or rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// Iteration log persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Worker/supervisor channel error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Session was cancelled through the cancellation signal
    #[error("Cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl QuimeraError {
    /// Errors that must terminate the process with a non-zero exit code
    pub fn is_fatal_input(&self) -> bool {
        matches!(self, QuimeraError::Config(_) | QuimeraError::MissingBinary(_))
    }
}

/// Result type alias for Quimera operations
pub type Result<T> = std::result::Result<T, QuimeraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = QuimeraError::Config("FOUNDRY_RPC_URL not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: FOUNDRY_RPC_URL not set");
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_missing_binary_error() {
        let err = QuimeraError::MissingBinary("forge".to_string());
        assert_eq!(err.to_string(), "Required binary not installed: forge");
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_analyzer_error_is_not_fatal_input() {
        let err = QuimeraError::Analyzer("no verified source".to_string());
        assert!(!err.is_fatal_input());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuimeraError = io_err.into();
        assert!(matches!(err, QuimeraError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: QuimeraError = json_err.into();
        assert!(matches!(err, QuimeraError::Json(_)));
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(QuimeraError::Cancelled.to_string(), "Cancelled");
    }
}
