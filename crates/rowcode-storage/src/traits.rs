//! Upload abstraction trait
//!
//! This module defines the UploadClient trait that all attachment backends implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rowcode_core::models::EncodedArtifact;
use rowcode_core::UploadError;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Table and field that receive the generated attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSlot {
    pub table_id: String,
    pub field_id: String,
}

impl AttachmentSlot {
    pub fn new(table_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            field_id: field_id.into(),
        }
    }
}

/// What the backend reported after storing an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub record_id: String,
    pub file_name: String,
    /// Backend-specific handle for the stored attachment (attachment token, file path).
    pub token: Option<String>,
    /// Where the attachment can be fetched from, when the backend exposes it.
    pub url: Option<String>,
    pub size_bytes: usize,
}

/// Stores one generated artifact against its record.
///
/// One call is one attempt: implementations do not retry. Transient failures must be
/// reported as [`UploadError::Status`] (5xx), [`UploadError::ConnectionReset`] or
/// [`UploadError::Timeout`] so the work queue can retry them. Uploading the same
/// artifact twice overwrites the attachment.
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn upload(&self, artifact: &EncodedArtifact) -> UploadResult<UploadReceipt>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
