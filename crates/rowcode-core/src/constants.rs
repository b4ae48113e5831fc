//! Defaults shared by the queue, the upload clients and the CLI.

/// Maximum number of uploads in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Minimum gap between two upload dispatches.
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 100;

/// Automatic retries per upload on transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Per-attempt upload timeout.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 30;

/// Backoff before retry `n` is `2^n * BASE`, capped at `MAX`.
pub const RETRY_BACKOFF_BASE_MS: u64 = 1_000;
pub const MAX_RETRY_BACKOFF_MS: u64 = 10_000;

/// A cached upload token is reused only while it stays valid at least this long.
pub const DEFAULT_TOKEN_MIN_VALIDITY_SECS: u64 = 60;

pub const DEFAULT_OUTPUT_DIR: &str = "./attachments";
