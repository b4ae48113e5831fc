use async_trait::async_trait;
use std::path::PathBuf;

use rowcode_core::models::SourceItem;
use rowcode_core::SourceError;

use super::DataSource;

/// JSON file holding an array of `{ "id": string, "value": string | number | null }`.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(data: &[u8]) -> Result<Vec<SourceItem>, SourceError> {
        serde_json::from_slice(data)
            .map_err(|e| SourceError::Malformed(format!("Invalid JSON records: {}", e)))
    }
}

#[async_trait]
impl DataSource for JsonSource {
    async fn fetch(&self) -> Result<Vec<SourceItem>, SourceError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            SourceError::Unreachable(format!("{}: {}", self.path.display(), e))
        })?;
        Self::parse(&data)
    }

    fn describe(&self) -> String {
        format!("json {}", self.path.display())
    }
}
