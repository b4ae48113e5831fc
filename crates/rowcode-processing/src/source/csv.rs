use async_trait::async_trait;
use std::path::PathBuf;

use rowcode_core::models::{RawValue, SourceItem};
use rowcode_core::SourceError;

use super::DataSource;

/// CSV file with a header row.
///
/// `value_column` holds the values to encode. Record ids come from `id_column` when
/// set, otherwise rows are named `row-{n}` (1-based, header excluded).
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    value_column: String,
    id_column: Option<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, value_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value_column: value_column.into(),
            id_column: None,
        }
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = Some(id_column.into());
        self
    }

    /// Parse CSV text already in memory.
    pub fn parse(&self, data: &[u8]) -> Result<Vec<SourceItem>, SourceError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(::csv::Trim::Headers)
            .from_reader(data);

        let headers = reader
            .headers()
            .map_err(|e| SourceError::Malformed(format!("Failed to read CSV header: {}", e)))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SourceError::MissingColumn(name.to_string()))
        };

        let value_index = column(&self.value_column)?;
        let id_index = self.id_column.as_deref().map(column).transpose()?;

        let mut items = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                SourceError::Malformed(format!("Failed to read CSV row {}: {}", row + 1, e))
            })?;

            let record_id = match id_index.and_then(|i| record.get(i)) {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => format!("row-{}", row + 1),
            };
            let raw_value = record
                .get(value_index)
                .filter(|v| !v.is_empty())
                .map(|v| RawValue::Text(v.to_string()));

            items.push(SourceItem::new(record_id, raw_value));
        }

        Ok(items)
    }
}

#[async_trait]
impl DataSource for CsvSource {
    async fn fetch(&self) -> Result<Vec<SourceItem>, SourceError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            SourceError::Unreachable(format!("{}: {}", self.path.display(), e))
        })?;
        let items = self.parse(&data)?;

        tracing::debug!(
            path = %self.path.display(),
            rows = items.len(),
            "CSV source read"
        );
        Ok(items)
    }

    fn describe(&self) -> String {
        format!("csv {} (column '{}')", self.path.display(), self.value_column)
    }
}
