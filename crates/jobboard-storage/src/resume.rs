//! Storage interface for uploaded résumés.

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Extensions accepted for résumé uploads.
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".pdf", ".docx"];

/// Where résumé files live. Files are addressed by a flat name.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Write a file, replacing any previous one of the same name.
    async fn save(&self, name: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Remove a file. Removing a missing file succeeds.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Cheap readiness check.
    async fn check(&self) -> StorageResult<()>;
}

/// Reject names that could escape the storage root.
pub fn validate_name(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}

/// Lower-cased extension of `file_name`, dot included.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

/// Whether the extension is an accepted résumé format.
pub fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

/// MIME type stored alongside a résumé.
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some(".pdf") => "application/pdf",
        Some(".docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
