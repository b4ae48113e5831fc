//! Record API upload client
//!
//! Stores an artifact in a record's attachment field:
//!
//! `PUT {base_url}/tables/{table_id}/records/{record_id}/attachments/{field_id}`
//!
//! with `Authorization: Bearer {token}` and a multipart body holding a single `file`
//! part. The token is requested from the injected [`CredentialProvider`] on every call.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use rowcode_core::error::is_reset_io_kind;
use rowcode_core::models::EncodedArtifact;
use rowcode_core::UploadError;

use crate::credentials::CredentialProvider;
use crate::keys::validate_segment;
use crate::traits::{AttachmentSlot, UploadClient, UploadReceipt, UploadResult};

#[derive(Debug, Default, Deserialize)]
struct AttachmentResponse {
    token: Option<String>,
    url: Option<String>,
}

/// Classify a transport-level reqwest failure for the retry policy.
pub(crate) fn map_transport_error(err: reqwest::Error) -> UploadError {
    let message = error_chain(&err);
    if err.is_timeout() {
        return UploadError::Timeout(message);
    }
    if is_connection_reset(&err) {
        return UploadError::ConnectionReset(message);
    }
    UploadError::Network(message)
}

/// `err` followed by each of its sources, joined with `: `.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let cause = inner.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
        source = inner.source();
    }
    message
}

fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if is_reset_io_kind(io.kind()) {
                return true;
            }
        }
        let message = inner.to_string().to_lowercase();
        if message.contains("connection reset")
            || message.contains("connection closed before message completed")
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// HTTP client for the record attachment API.
#[derive(Clone)]
pub struct HttpUploadClient {
    client: Client,
    base_url: String,
    slot: AttachmentSlot,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpUploadClient {
    pub fn new(
        base_url: impl Into<String>,
        slot: AttachmentSlot,
        credentials: Arc<dyn CredentialProvider>,
    ) -> UploadResult<Self> {
        Self::with_timeout(base_url, slot, credentials, Duration::from_secs(60))
    }

    /// Like [`new`](Self::new) with an explicit per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        slot: AttachmentSlot,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> UploadResult<Self> {
        validate_segment("table id", &slot.table_id)?;
        validate_segment("field id", &slot.field_id)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            slot,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn slot(&self) -> &AttachmentSlot {
        &self.slot
    }

    /// Attachment endpoint for `record_id`.
    pub fn attachment_url(&self, record_id: &str) -> String {
        format!(
            "{}/tables/{}/records/{}/attachments/{}",
            self.base_url,
            urlencoding::encode(&self.slot.table_id),
            urlencoding::encode(record_id),
            urlencoding::encode(&self.slot.field_id)
        )
    }
}

#[async_trait]
impl UploadClient for HttpUploadClient {
    #[tracing::instrument(skip(self, artifact), fields(record_id = %artifact.record_id, size_bytes = artifact.size_bytes()))]
    async fn upload(&self, artifact: &EncodedArtifact) -> UploadResult<UploadReceipt> {
        validate_segment("record id", &artifact.record_id)?;
        if artifact.bytes.is_empty() {
            return Err(UploadError::Validation(format!(
                "artifact for record '{}' is empty",
                artifact.record_id
            )));
        }

        let credential = self.credentials.credential().await?;

        let part = Part::bytes(artifact.bytes.to_vec())
            .file_name(artifact.file_name.clone())
            .mime_str(&artifact.mime_type)
            .map_err(|e| {
                UploadError::Validation(format!("Invalid mime type '{}': {}", artifact.mime_type, e))
            })?;
        let form = Form::new().part("file", part);

        let start = std::time::Instant::now();
        let response = self
            .client
            .put(self.attachment_url(&artifact.record_id))
            .header("Authorization", format!("Bearer {}", credential.token))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        // Some deployments answer 204 or plain text; the receipt fields are optional.
        let body = response.text().await.map_err(map_transport_error)?;
        let parsed: AttachmentResponse = serde_json::from_str(&body).unwrap_or_default();

        tracing::info!(
            file_name = %artifact.file_name,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Attachment uploaded"
        );

        Ok(UploadReceipt {
            record_id: artifact.record_id.clone(),
            file_name: artifact.file_name.clone(),
            token: parsed.token,
            url: parsed.url,
            size_bytes: artifact.size_bytes(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
