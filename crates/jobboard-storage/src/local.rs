//! Résumés on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::StorageResult;
use crate::resume::{validate_name, ResumeStore};

/// Default upload directory.
pub const DEFAULT_UPLOAD_PATH: &str = "./public/uploads";

/// Résumé store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalResumeStore {
    root: PathBuf,
}

impl LocalResumeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `UPLOAD_PATH`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("UPLOAD_PATH").unwrap_or_else(|_| DEFAULT_UPLOAD_PATH.to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ResumeStore for LocalResumeStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn save(&self, name: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.path_of(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        debug!("Writing {} bytes to {}", bytes.len(), path.display());
        tokio::fs::write(&path, bytes).await?;
        info!("Stored résumé {}", name);
        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Résumé {} already removed", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.path_of(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn check(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use serial_test::serial;

    #[tokio::test]
    async fn test_save_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResumeStore::new(dir.path().join("uploads"));

        store.save("Jane_Doe_j1.pdf", b"%PDF".to_vec()).await.unwrap();
        assert!(store.exists("Jane_Doe_j1.pdf").await.unwrap());
        let written = tokio::fs::read(dir.path().join("uploads/Jane_Doe_j1.pdf")).await.unwrap();
        assert_eq!(written, b"%PDF");

        store.delete("Jane_Doe_j1.pdf").await.unwrap();
        assert!(!store.exists("Jane_Doe_j1.pdf").await.unwrap());
        store.delete("Jane_Doe_j1.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalResumeStore::new(dir.path());
        let result = store.save("../escape.pdf", Vec::new()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("UPLOAD_PATH", "/tmp/resumes");
        assert_eq!(LocalResumeStore::from_env().root(), Path::new("/tmp/resumes"));
        std::env::remove_var("UPLOAD_PATH");
        assert_eq!(LocalResumeStore::from_env().root(), Path::new(DEFAULT_UPLOAD_PATH));
    }
}
