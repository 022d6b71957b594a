//! Error types for the download core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Every failure an attempt can run into is represented here, and
//! [`DownloadError::kind`] is the one place that decides how the attempt
//! controller reacts to it.
//!
//! ## Failure taxonomy
//!
//! - Probe failures (no length learned) → retry by re-probing
//! - Range mismatches (206 expected, 200 received, or the reverse) → retry
//! - Cancellation → not an error, resolves as success with partial state kept
//! - Transport and file I/O errors → retry until the attempt budget runs out
//! - Attempt budget exhausted → terminal, fixed message
//! - Everything else (storage, configuration) → terminal

use thiserror::Error;

/// Result type alias using our DownloadError type
pub type Result<T> = std::result::Result<T, DownloadError>;

/// How the attempt controller should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Cooperative stop requested by the host
    Cancelled,
    /// Worth another attempt; partial progress is kept
    Transient,
    /// Surface to the caller as a terminal failure
    Fatal,
}

/// Main error type for the download core
#[derive(Error, Debug)]
pub enum DownloadError {
    // ===== Download Errors =====

    /// Probe request did not yield a usable content length
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    /// Server answered a range request with a full response, or the reverse
    #[error("Range mismatch: expected HTTP {expected}, got HTTP {actual}")]
    RangeMismatch {
        expected: u16,
        actual: u16,
    },

    /// Server returned a status outside the accepted set
    #[error("Server responded with unexpected status: {status_line}")]
    UnexpectedStatus {
        status_code: u16,
        status_line: String,
    },

    /// Stream ended cleanly but fewer bytes than the record's total arrived
    #[error("Download incomplete: {actual}/{expected} bytes")]
    TruncatedBody {
        expected: u64,
        actual: u64,
    },

    /// Attempt number exceeds the configured budget
    #[error("Too many attempts")]
    TooManyAttempts {
        attempts: u32,
        max: u32,
    },

    /// Server now reports a different total length than the stored record
    #[error("Source changed: expected {expected} bytes, server reports {actual} bytes")]
    SourceChanged {
        expected: u64,
        actual: u64,
    },

    /// Server served a range starting somewhere other than requested
    #[error("Content-Range starts at byte {served}, requested {requested}")]
    ContentRangeMismatch {
        requested: u64,
        served: u64,
    },

    /// Server sent more bytes than the record's total length
    #[error("Received more data than expected: {actual} > {expected} bytes")]
    LengthExceeded {
        expected: u64,
        actual: u64,
    },

    /// Invalid download URL format or protocol
    #[error("Invalid download URL: {0}")]
    InvalidDownloadUrl(String),

    // ===== File/Storage Errors =====

    /// Invalid file path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Record claims progress the partial file on disk does not hold
    #[error("Partial file missing or shorter than recorded progress: {0}")]
    PartialFileMissing(String),

    /// Record not found in the store
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Record already exists for the key
    #[error("Record already exists: {0}")]
    DuplicateRecord(String),

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    // ===== Configuration Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== General Errors =====

    /// Operation was cancelled by user or system
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<url::ParseError> for DownloadError {
    fn from(err: url::ParseError) -> Self {
        DownloadError::InvalidDownloadUrl(err.to_string())
    }
}

impl DownloadError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        DownloadError::RecordNotFound(resource.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        DownloadError::InternalError(message.into())
    }

    /// Create an UnexpectedStatus error from a response status
    pub fn unexpected_status(status: reqwest::StatusCode) -> Self {
        DownloadError::UnexpectedStatus {
            status_code: status.as_u16(),
            status_line: status_line(status),
        }
    }

    /// Classify the error for the attempt controller
    ///
    /// Transport errors and file I/O are transient: the next attempt resumes
    /// from the last persisted offset. Storage and configuration errors will
    /// not improve on retry.
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::Cancelled => FailureKind::Cancelled,
            DownloadError::ProbeFailed(_)
            | DownloadError::RangeMismatch { .. }
            | DownloadError::UnexpectedStatus { .. }
            | DownloadError::TruncatedBody { .. }
            | DownloadError::ContentRangeMismatch { .. }
            | DownloadError::LengthExceeded { .. }
            | DownloadError::ReqwestError(_)
            | DownloadError::IoError(_) => FailureKind::Transient,
            _ => FailureKind::Fatal,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Get user-friendly error message suitable for a failure notification
    pub fn user_message(&self) -> String {
        match self {
            DownloadError::SqlxError(_) | DownloadError::MigrationFailed(_) => {
                "Download failed: could not save download progress".to_string()
            }
            DownloadError::InvalidPath(path) => {
                format!("Download failed: cannot write to {}", path)
            }
            DownloadError::SourceChanged { .. } | DownloadError::PartialFileMissing(_) => {
                "Download failed: partial download no longer matches the source, delete it and start again".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Render a status as an HTTP status line fragment, e.g. `206 Partial Content`
pub fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_not_a_failure() {
        assert_eq!(DownloadError::Cancelled.kind(), FailureKind::Cancelled);
        assert!(!DownloadError::Cancelled.is_retryable());
    }

    #[test]
    fn test_range_and_io_errors_are_transient() {
        let mismatch = DownloadError::RangeMismatch { expected: 206, actual: 200 };
        assert_eq!(mismatch.kind(), FailureKind::Transient);

        let io = DownloadError::IoError(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(io.is_retryable());

        let truncated = DownloadError::TruncatedBody { expected: 1000, actual: 10 };
        assert!(truncated.is_retryable());
    }

    #[test]
    fn test_storage_errors_are_fatal() {
        let err = DownloadError::MigrationFailed("boom".to_string());
        assert_eq!(err.kind(), FailureKind::Fatal);
        assert_eq!(
            DownloadError::not_found("x").kind(),
            FailureKind::Fatal
        );
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            status_line(reqwest::StatusCode::PARTIAL_CONTENT),
            "206 Partial Content"
        );
        let err = DownloadError::unexpected_status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Server responded with unexpected status: 404 Not Found");
    }

    #[test]
    fn test_too_many_attempts_message() {
        let err = DownloadError::TooManyAttempts { attempts: 4, max: 3 };
        assert_eq!(err.to_string(), "Too many attempts");
        assert_eq!(err.user_message(), "Too many attempts");
        assert_eq!(err.kind(), FailureKind::Fatal);
    }
}
