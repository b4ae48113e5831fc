use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Raw cell value as read from the data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(serde_json::Number),
}

impl Display for RawValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RawValue::Text(text) => write!(f, "{}", text),
            RawValue::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value.into())
    }
}

/// One row of the selected view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceItem {
    #[serde(alias = "id")]
    pub record_id: String,
    #[serde(alias = "value", default)]
    pub raw_value: Option<RawValue>,
}

impl SourceItem {
    pub fn new(record_id: impl Into<String>, raw_value: Option<RawValue>) -> Self {
        Self {
            record_id: record_id.into(),
            raw_value,
        }
    }

    pub fn text(record_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(record_id, Some(RawValue::Text(value.into())))
    }

    pub fn empty(record_id: impl Into<String>) -> Self {
        Self::new(record_id, None)
    }

    /// Trimmed string form of the value, or `None` when the item has nothing to encode.
    pub fn encodable_value(&self) -> Option<String> {
        let value = self.raw_value.as_ref()?.to_string();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Image produced by an encoder, before it is bound to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    pub extension: String,
}

/// Generated image bound to the record it will be attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArtifact {
    pub record_id: String,
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

impl EncodedArtifact {
    /// Binds `image` to `record_id`, naming the file after the encoded value.
    pub fn from_image(record_id: impl Into<String>, value: &str, image: EncodedImage) -> Self {
        Self {
            record_id: record_id.into(),
            file_name: format!("{}.{}", file_stem(value), image.extension),
            bytes: image.bytes,
            mime_type: image.mime_type,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

fn file_stem(value: &str) -> String {
    const MAX: usize = 100;
    let stem: String = value
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "code".to_string()
    } else {
        stem
    }
}
