//! Résumé file storage.
//!
//! This crate provides:
//! - The [`ResumeStore`] interface and upload name/extension rules
//! - [`LocalResumeStore`] writing under an upload directory
//! - [`R2Client`] storing objects in Cloudflare R2

pub mod client;
pub mod error;
pub mod local;
pub mod resume;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::{LocalResumeStore, DEFAULT_UPLOAD_PATH};
pub use resume::{
    content_type_for, extension_of, is_allowed_extension, validate_name, ResumeStore,
    ALLOWED_EXTENSIONS,
};
