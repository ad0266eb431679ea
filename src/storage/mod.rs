//! Content storage handle held by provider adapters
//!
//! Generation never touches storage; adapters acquire a handle at
//! construction so the surrounding system can reach it through them.

pub mod local;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use local::LocalStorage;

/// Storage backend kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Backend kind
    #[serde(default)]
    pub kind: StorageKind,

    /// Root directory for the local backend
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            root: default_root(),
        }
    }
}

/// Content storage keyed by relative path
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `path`, creating parent directories as needed
    async fn save_file(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read the content stored at `path`
    async fn get_file(&self, path: &str) -> Result<Bytes>;

    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Remove `path`; returns whether anything was deleted
    async fn delete_file(&self, path: &str) -> Result<bool>;
}

/// Create the storage backend described by `settings`
#[must_use]
pub fn create_storage(settings: &StorageSettings) -> Arc<dyn Storage> {
    match settings.kind {
        StorageKind::Local => Arc::new(LocalStorage::new(settings.root.clone())),
    }
}
