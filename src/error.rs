//! Structured error types for the sync job.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Fatal: abort the run
    TransportFailure,
    InvalidParams,
    DatabaseError,

    // Recoverable: logged, processing continues
    DownloadFailure,
    RepositoryValidation,

    InternalError,
}

/// Structured error raised by the sync job and its collaborators.
#[derive(Debug, Serialize)]
pub struct SyncError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SyncError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn transport(url: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TransportFailure,
            format!("Requested \"{}\" got \"{}\"", url, reason),
        )
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, reason)
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::RepositoryValidation, reason)
    }

    pub fn download(uri: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DownloadFailure,
            format!("Download of \"{}\" failed: {}", uri, reason),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{} ({})", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SyncError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SyncError>() {
            Ok(sync_err) => sync_err,
            Err(err) => SyncError::database(format!("{:#}", err)),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
