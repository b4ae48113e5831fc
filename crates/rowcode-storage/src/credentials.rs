//! Upload credentials
//!
//! Every upload attempt asks its [`CredentialProvider`] for a credential, so a token
//! that expires mid-run is replaced on the next attempt instead of failing every
//! remaining upload.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::traits::UploadResult;

/// Bearer token plus its expiry, if it has one.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: Option<Instant>,
}

impl Credential {
    /// Token that never expires.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Token valid for `ttl` from now.
    pub fn expiring(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    /// Whether the token stays valid for more than `min_validity` from now.
    pub fn is_valid_for(&self, min_validity: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => {
                expires_at.saturating_duration_since(Instant::now()) > min_validity
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of upload credentials, called once per upload attempt.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> UploadResult<Credential>;
}

/// Always hands out the same long-lived token.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self) -> UploadResult<Credential> {
        Ok(Credential::bearer(self.token.clone()))
    }
}

/// Caches another provider's credential and reuses it while it stays valid for more
/// than `min_validity`. Concurrent callers wait for a single refresh.
pub struct RefreshingCredentialProvider {
    inner: Arc<dyn CredentialProvider>,
    min_validity: Duration,
    cached: Mutex<Option<Credential>>,
}

impl RefreshingCredentialProvider {
    pub fn new(inner: Arc<dyn CredentialProvider>, min_validity: Duration) -> Self {
        Self {
            inner,
            min_validity,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CredentialProvider for RefreshingCredentialProvider {
    async fn credential(&self) -> UploadResult<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_for(self.min_validity) {
                return Ok(credential.clone());
            }
        }

        tracing::debug!(
            min_validity_secs = self.min_validity.as_secs(),
            "Refreshing upload credential"
        );
        let fresh = self.inner.credential().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(feature = "upload-http")]
pub use token_endpoint::TokenEndpointProvider;

#[cfg(feature = "upload-http")]
mod token_endpoint {
    use super::*;
    use reqwest::Client;
    use serde::Deserialize;

    use crate::http::map_transport_error;
    use rowcode_core::UploadError;

    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
        expires_in: Option<u64>,
    }

    /// Mints a fresh token from an OAuth-style token endpoint on every call
    /// (client credentials grant). Wrap it in [`RefreshingCredentialProvider`] to reuse
    /// tokens across uploads.
    #[derive(Clone)]
    pub struct TokenEndpointProvider {
        client: Client,
        token_url: String,
        client_id: String,
        client_secret: String,
    }

    impl TokenEndpointProvider {
        pub fn new(
            token_url: impl Into<String>,
            client_id: impl Into<String>,
            client_secret: impl Into<String>,
        ) -> UploadResult<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| {
                    UploadError::Credential(format!("Failed to create HTTP client: {}", e))
                })?;

            Ok(Self {
                client,
                token_url: token_url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            })
        }
    }

    #[async_trait]
    impl CredentialProvider for TokenEndpointProvider {
        async fn credential(&self) -> UploadResult<Credential> {
            let response = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ])
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                // Server-side failures stay retryable; anything else is a bad grant.
                if status.is_server_error() {
                    return Err(UploadError::Status {
                        status: status.as_u16(),
                        message: format!("token endpoint: {}", error_text),
                    });
                }
                return Err(UploadError::Credential(format!(
                    "token endpoint returned {}: {}",
                    status, error_text
                )));
            }

            let body: TokenResponse = response.json().await.map_err(|e| {
                UploadError::Credential(format!("Failed to parse token response: {}", e))
            })?;

            tracing::debug!(expires_in = ?body.expires_in, "Upload token issued");

            Ok(match body.expires_in {
                Some(secs) => Credential::expiring(body.access_token, Duration::from_secs(secs)),
                None => Credential::bearer(body.access_token),
            })
        }
    }
}
