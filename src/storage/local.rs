//! Filesystem-backed storage

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::Storage;
use crate::error::{LlmError, Result};

/// Storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage key to a path under the root
    ///
    /// Keys must be relative and may not climb out of the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if !valid {
            return Err(LlmError::Storage(format!("Invalid storage path: {key}")));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save_file(&self, path: &str, data: Bytes) -> Result<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, &data).await?;
        tracing::debug!(path = %full_path.display(), bytes = data.len(), "Saved file");
        Ok(())
    }

    async fn get_file(&self, path: &str) -> Result<Bytes> {
        let full_path = self.resolve(path)?;
        match fs::read(&full_path).await {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LlmError::Storage(format!("File not found: {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        Ok(fs::try_exists(&full_path).await?)
    }

    async fn delete_file(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
