//! rowcode Storage Library
//!
//! This crate provides the upload abstraction used by conversion runs and its
//! implementations: the record attachment API over HTTP and a local directory.
//!
//! # Attachment key format
//!
//! Every backend stores an artifact under `{record_id}/{file_name}`. Uploading the same
//! file name for the same record again replaces the previous attachment.
//!
//! Keys must not contain `..`, path separators or control characters. Validation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod credentials;
pub mod factory;
#[cfg(feature = "upload-http")]
pub mod http;
pub(crate) mod keys;
#[cfg(feature = "upload-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "upload-http")]
pub use credentials::TokenEndpointProvider;
pub use credentials::{
    Credential, CredentialProvider, RefreshingCredentialProvider, StaticCredentialProvider,
};
#[cfg(feature = "upload-http")]
pub use factory::create_credential_provider;
pub use factory::create_upload_client;
#[cfg(feature = "upload-http")]
pub use http::HttpUploadClient;
#[cfg(feature = "upload-local")]
pub use local::LocalUploadClient;
pub use rowcode_core::UploadError;
pub use traits::{AttachmentSlot, UploadClient, UploadReceipt, UploadResult};
