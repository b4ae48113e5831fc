//! Error types module
//!
//! Typed errors for the three external collaborators of a conversion run (encoder,
//! upload client, data source) and for the run itself. Upload errors convert into
//! [`TaskError`] so the work queue can classify them for retry.

use crate::task_error::{FailureKind, TaskError};

/// The encoder could not represent a value in the requested format.
///
/// Always fatal: the same value will be rejected again on retry.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid {format} value '{value}': {reason}")]
    InvalidValue {
        format: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported encoding: {0}")]
    Unsupported(String),

    #[error("Image rendering failed: {0}")]
    Render(String),
}

/// Failure of a single upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload rejected with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Upload timed out: {0}")]
    Timeout(String),

    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Status code reported by the upstream, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            UploadError::Status { status, .. } => FailureKind::Status(*status),
            UploadError::ConnectionReset(_) => FailureKind::ConnectionReset,
            UploadError::Timeout(_) => FailureKind::Timeout,
            UploadError::Io(e) if is_reset_io_kind(e.kind()) => FailureKind::ConnectionReset,
            UploadError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => FailureKind::Timeout,
            UploadError::Credential(_)
            | UploadError::Validation(_)
            | UploadError::Network(_)
            | UploadError::Io(_) => FailureKind::Fatal,
        }
    }

    /// Whether the queue should retry this failure.
    pub fn is_transient(&self) -> bool {
        self.failure_kind().is_retryable()
    }
}

/// IO error kinds that mean the peer dropped the connection.
pub fn is_reset_io_kind(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}

impl From<UploadError> for TaskError {
    fn from(err: UploadError) -> Self {
        let kind = err.failure_kind();
        TaskError::new(kind, err)
    }
}

impl From<EncodeError> for TaskError {
    fn from(err: EncodeError) -> Self {
        TaskError::fatal(err)
    }
}

/// The data source could not be read.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Data source unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed data source: {0}")]
    Malformed(String),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Setup-level failure that prevents a conversion run from starting.
///
/// Per-item failures never surface here; they are folded into the run's stats.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to read records: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid conversion config: {0}")]
    InvalidConfig(String),
}
