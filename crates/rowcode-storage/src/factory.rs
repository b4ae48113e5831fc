#[cfg(feature = "upload-local")]
use crate::LocalUploadClient;
use crate::{AttachmentSlot, UploadClient, UploadResult};
#[cfg(feature = "upload-http")]
use crate::{
    CredentialProvider, HttpUploadClient, RefreshingCredentialProvider, StaticCredentialProvider,
    TokenEndpointProvider,
};
#[cfg(feature = "upload-http")]
use rowcode_core::CredentialSource;
use rowcode_core::{UploadError, UploadTarget};
use std::sync::Arc;
#[cfg(feature = "upload-http")]
use std::time::Duration;

/// Build the credential provider described by `source`.
#[cfg(feature = "upload-http")]
pub fn create_credential_provider(
    source: &CredentialSource,
) -> UploadResult<Arc<dyn CredentialProvider>> {
    match source {
        CredentialSource::StaticToken(token) => {
            Ok(Arc::new(StaticCredentialProvider::new(token.clone())))
        }
        CredentialSource::TokenEndpoint {
            token_url,
            client_id,
            client_secret,
            min_validity_secs,
        } => {
            let endpoint =
                TokenEndpointProvider::new(token_url.clone(), client_id.clone(), client_secret.clone())?;
            Ok(Arc::new(RefreshingCredentialProvider::new(
                Arc::new(endpoint),
                Duration::from_secs(*min_validity_secs),
            )))
        }
    }
}

/// Create an upload client for the configured target
///
/// Remote targets need the attachment slot (table and field) the artifacts go to.
pub async fn create_upload_client(
    target: &UploadTarget,
    slot: Option<AttachmentSlot>,
) -> UploadResult<Arc<dyn UploadClient>> {
    match target {
        #[cfg(feature = "upload-local")]
        UploadTarget::Local { root } => {
            let client = LocalUploadClient::new(root.clone()).await?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "upload-local"))]
        UploadTarget::Local { .. } => Err(UploadError::Validation(
            "Local upload backend not available (upload-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "upload-http")]
        UploadTarget::Remote {
            api_url,
            credentials,
        } => {
            let slot = slot.ok_or_else(|| {
                UploadError::Validation(
                    "Remote uploads need a table id and a field id".to_string(),
                )
            })?;
            let provider = create_credential_provider(credentials)?;
            let client = HttpUploadClient::new(api_url.clone(), slot, provider)?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "upload-http"))]
        UploadTarget::Remote { .. } => {
            let _ = slot;
            Err(UploadError::Validation(
                "HTTP upload backend not available (upload-http feature not enabled)".to_string(),
            ))
        }
    }
}
