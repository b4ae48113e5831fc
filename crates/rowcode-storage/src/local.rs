use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use rowcode_core::models::EncodedArtifact;
use rowcode_core::UploadError;

use crate::keys::attachment_key;
use crate::traits::{UploadClient, UploadReceipt, UploadResult};

/// Local filesystem attachment store
///
/// Writes each artifact to `{root}/{record_id}/{file_name}`, replacing any previous
/// file of the same name.
#[derive(Clone, Debug)]
pub struct LocalUploadClient {
    root: PathBuf,
}

impl LocalUploadClient {
    /// Create a new LocalUploadClient, creating `root` if needed.
    pub async fn new(root: impl Into<PathBuf>) -> UploadResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            UploadError::Validation(format!(
                "Failed to create output directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalUploadClient { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path an artifact is written to.
    pub fn path_for(&self, artifact: &EncodedArtifact) -> UploadResult<PathBuf> {
        let key = attachment_key(&artifact.record_id, &artifact.file_name)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl UploadClient for LocalUploadClient {
    async fn upload(&self, artifact: &EncodedArtifact) -> UploadResult<UploadReceipt> {
        let path = self.path_for(artifact)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await?;
        file.write_all(&artifact.bytes).await?;
        file.sync_all().await?;

        tracing::info!(
            path = %path.display(),
            record_id = %artifact.record_id,
            size_bytes = artifact.size_bytes(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Attachment written"
        );

        Ok(UploadReceipt {
            record_id: artifact.record_id.clone(),
            file_name: artifact.file_name.clone(),
            token: Some(path.display().to_string()),
            url: None,
            size_bytes: artifact.size_bytes(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
