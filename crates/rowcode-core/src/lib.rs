//! rowcode core library
//!
//! Domain models, error types and configuration shared by the work queue, the upload
//! clients, the conversion pipeline and the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod task_error;

// Re-export commonly used types
pub use config::{Config, CredentialSource, UploadTarget};
pub use error::{EncodeError, PipelineError, SourceError, UploadError};
pub use task_error::{FailureKind, TaskError, TaskResultExt};
