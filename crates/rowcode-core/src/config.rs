//! Configuration module
//!
//! Runtime configuration read from the environment (and `.env`): queue limits, retry
//! policy, where artifacts are uploaded and how upload credentials are obtained.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_DISPATCH_INTERVAL_MS, DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT_DIR,
    DEFAULT_TASK_TIMEOUT_SECS, DEFAULT_TOKEN_MIN_VALIDITY_SECS,
};

/// How upload credentials are obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// Long-lived API token sent as-is on every call.
    StaticToken(String),
    /// Short-lived tokens minted by a token endpoint (client credentials grant).
    TokenEndpoint {
        token_url: String,
        client_id: String,
        client_secret: String,
        min_validity_secs: u64,
    },
}

/// Where generated artifacts go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadTarget {
    /// Write attachments under a local directory.
    Local { root: PathBuf },
    /// Store attachments through the record API.
    Remote {
        api_url: String,
        credentials: CredentialSource,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub concurrency: usize,
    pub dispatch_interval_ms: u64,
    pub max_retries: u32,
    pub task_timeout_secs: u64,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_min_validity_secs: u64,
    pub output_dir: PathBuf,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dispatch_interval_ms: DEFAULT_DISPATCH_INTERVAL_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            api_url: None,
            api_token: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            token_min_validity_secs: DEFAULT_TOKEN_MIN_VALIDITY_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unparseable numbers fall back
    /// to their defaults; empty strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Config {
            concurrency: get("ROWCODE_CONCURRENCY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONCURRENCY),
            dispatch_interval_ms: get("ROWCODE_DISPATCH_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DISPATCH_INTERVAL_MS),
            max_retries: get("ROWCODE_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            task_timeout_secs: get("ROWCODE_TASK_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TASK_TIMEOUT_SECS),
            api_url: get("ROWCODE_API_URL").map(|url| url.trim_end_matches('/').to_string()),
            api_token: get("ROWCODE_API_TOKEN"),
            token_url: get("ROWCODE_TOKEN_URL"),
            client_id: get("ROWCODE_CLIENT_ID"),
            client_secret: get("ROWCODE_CLIENT_SECRET"),
            token_min_validity_secs: get("ROWCODE_TOKEN_MIN_VALIDITY_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_MIN_VALIDITY_SECS),
            output_dir: get("ROWCODE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            log_format: get("LOG_FORMAT")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "text".to_string()),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("ROWCODE_CONCURRENCY must be at least 1"));
        }

        if self.task_timeout_secs == 0 {
            return Err(anyhow::anyhow!("ROWCODE_TASK_TIMEOUT_SECS must be greater than 0"));
        }

        if let Some(api_url) = &self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "ROWCODE_API_URL must be an http(s) URL, got '{}'",
                    api_url
                ));
            }
            if self.api_token.is_none() && self.token_url.is_none() {
                return Err(anyhow::anyhow!(
                    "ROWCODE_API_URL requires ROWCODE_API_TOKEN or ROWCODE_TOKEN_URL to be set"
                ));
            }
        }

        if self.token_url.is_some() && (self.client_id.is_none() || self.client_secret.is_none())
        {
            return Err(anyhow::anyhow!(
                "ROWCODE_TOKEN_URL requires ROWCODE_CLIENT_ID and ROWCODE_CLIENT_SECRET to be set"
            ));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow::anyhow!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Resolve where artifacts are uploaded. A token endpoint wins over a static token.
    pub fn upload_target(&self) -> UploadTarget {
        let Some(api_url) = self.api_url.clone() else {
            return UploadTarget::Local {
                root: self.output_dir.clone(),
            };
        };

        let credentials = match (&self.token_url, &self.client_id, &self.client_secret) {
            (Some(token_url), Some(client_id), Some(client_secret)) => {
                CredentialSource::TokenEndpoint {
                    token_url: token_url.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    min_validity_secs: self.token_min_validity_secs,
                }
            }
            _ => CredentialSource::StaticToken(self.api_token.clone().unwrap_or_default()),
        };

        UploadTarget::Remote {
            api_url,
            credentials,
        }
    }
}
