//! Data sources
//!
//! A [`DataSource`] yields the rows of the selected view once, at the start of a run.

mod csv;
mod json;

pub use self::csv::CsvSource;
pub use self::json::JsonSource;

use async_trait::async_trait;

use rowcode_core::models::SourceItem;
use rowcode_core::SourceError;

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<SourceItem>, SourceError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    items: Vec<SourceItem>,
}

impl MemorySource {
    pub fn new(items: Vec<SourceItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch(&self) -> Result<Vec<SourceItem>, SourceError> {
        Ok(self.items.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} rows)", self.items.len())
    }
}
