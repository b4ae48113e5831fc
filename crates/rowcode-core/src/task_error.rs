//! Task execution error types
//!
//! Every task run by the work queue fails with a [`TaskError`]. The error carries a
//! [`FailureKind`] so the queue can decide, without knowing anything about uploads or
//! barcodes, whether another attempt is worth making.

use std::fmt;

/// Why a task attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream answered with an HTTP-like status code.
    Status(u16),
    /// The connection was reset or dropped mid-request.
    ConnectionReset,
    /// The attempt did not settle within the task timeout.
    Timeout,
    /// The task was still queued when the queue was cancelled.
    Cancelled,
    /// The task future went away without producing a result (e.g. it panicked).
    Aborted,
    /// Deterministic failure: bad input, validation, missing configuration.
    Fatal,
}

impl FailureKind {
    /// Upstream statuses that are expected to succeed on a later attempt.
    pub const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

    /// Returns true for the fixed set of transient conditions:
    /// 500/502/503/504, connection reset and timeout.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Status(status) => Self::RETRYABLE_STATUSES.contains(status),
            FailureKind::ConnectionReset | FailureKind::Timeout => true,
            FailureKind::Cancelled | FailureKind::Aborted | FailureKind::Fatal => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Status(status) => write!(f, "status_{}", status),
            FailureKind::ConnectionReset => write!(f, "connection_reset"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Aborted => write!(f, "aborted"),
            FailureKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Task execution error tagged with its [`FailureKind`].
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    kind: FailureKind,
}

impl TaskError {
    pub fn new(kind: FailureKind, err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            kind,
        }
    }

    /// Create a fatal task error
    ///
    /// Fatal errors fail the task immediately without consuming a retry. Use this for
    /// invalid input, 4xx responses and anything else that will not change on retry.
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        Self::new(FailureKind::Fatal, err)
    }

    /// Error for an upstream response carrying `status`.
    pub fn status(status: u16, err: impl Into<anyhow::Error>) -> Self {
        Self::new(FailureKind::Status(status), err)
    }

    pub fn connection_reset(err: impl Into<anyhow::Error>) -> Self {
        Self::new(FailureKind::ConnectionReset, err)
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            anyhow::anyhow!("Task did not settle within {}ms", after.as_millis()),
        )
    }

    /// Error handed to tasks rejected by `cancel_all` before they started.
    pub fn cancelled() -> Self {
        Self::new(
            FailureKind::Cancelled,
            anyhow::anyhow!("Queue cancelled before the task was dispatched"),
        )
    }

    pub fn aborted() -> Self {
        Self::new(
            FailureKind::Aborted,
            anyhow::anyhow!("Task terminated without producing a result"),
        )
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Untyped errors carry no status information, so they are treated as fatal.
    fn from(err: anyhow::Error) -> Self {
        Self::fatal(err)
    }
}

/// Extension trait for Result to tag errors with a failure kind
pub trait TaskResultExt<T> {
    /// Mark this result as fatal on error
    fn fatal(self) -> Result<T, TaskError>;

    /// Tag the error with an explicit failure kind
    fn with_kind(self, kind: FailureKind) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn fatal(self) -> Result<T, TaskError> {
        self.map_err(TaskError::fatal)
    }

    fn with_kind(self, kind: FailureKind) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::new(kind, e))
    }
}
