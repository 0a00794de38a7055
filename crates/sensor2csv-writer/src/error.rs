//! Error types for the CSV writer crate

use std::path::{Path, PathBuf};

use sensor2csv_core::Endpoint;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write to '{}' for endpoint '{endpoint}' failed: {message}", .path.display())]
    WriteFailure {
        code: &'static str,
        endpoint: Endpoint,
        path: PathBuf,
        /// The last underlying error
        message: String,
    },
}

impl WriterError {
    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(endpoint: Endpoint, path: &Path, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure.as_str(),
            endpoint,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::E004InvalidConfig,
            Self::WriteFailure { .. } => ErrorCode::E005WriteFailure,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_failure_names_path_and_endpoint() {
        let err = WriterError::write_failure(
            Endpoint::Data2,
            Path::new("/data/bme_co2.csv"),
            "disk full",
        );
        let msg = err.to_string();
        assert!(msg.starts_with("[E005]"));
        assert!(msg.contains("/data/bme_co2.csv"));
        assert!(msg.contains("data2"));
        assert!(msg.contains("disk full"));
        assert_eq!(err.code(), ErrorCode::E005WriteFailure);
    }

    #[test]
    fn invalid_config_has_its_own_code() {
        let err = WriterError::invalid_config("retry attempts must be at least 1");
        assert_eq!(err.code().as_str(), "E004");
    }
}
