//! Attachment key rules shared by the upload backends.
//!
//! Key format: `{record_id}/{file_name}`. Neither segment may be empty, contain a path
//! separator or `..`, or contain control characters.

use rowcode_core::UploadError;

/// Reject identifiers that could escape their directory or break a URL path.
pub fn validate_segment(what: &str, segment: &str) -> Result<(), UploadError> {
    if segment.trim().is_empty() {
        return Err(UploadError::Validation(format!("{} is empty", what)));
    }
    if segment.contains("..")
        || segment.contains('/')
        || segment.contains('\\')
        || segment.chars().any(char::is_control)
    {
        return Err(UploadError::Validation(format!(
            "{} '{}' contains invalid characters",
            what, segment
        )));
    }
    Ok(())
}

/// Build the attachment key for a record's file.
pub fn attachment_key(record_id: &str, file_name: &str) -> Result<String, UploadError> {
    validate_segment("record id", record_id)?;
    validate_segment("file name", file_name)?;
    Ok(format!("{}/{}", record_id, file_name))
}
