/// Asset sink - hands out destinations for extracted cover art
use crate::error::SinkError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Storage collaborator for extracted assets
///
/// The pipeline only needs a fresh, unique, writable location per asset.
/// Whatever ends up there belongs to the caller once ingestion returns it.
#[async_trait]
pub trait AssetSink: Send + Sync {
    /// Allocate a new unique location for a file with the given extension
    async fn allocate(&self, extension: &str) -> Result<PathBuf, SinkError>;
}

/// Sink that stores assets as uniquely named files in one directory
#[derive(Debug, Clone)]
pub struct LocalAssetSink {
    base_path: PathBuf,
}

impl LocalAssetSink {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the storage directory
    pub async fn initialize(&self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }
}

#[async_trait]
impl AssetSink for LocalAssetSink {
    async fn allocate(&self, extension: &str) -> Result<PathBuf, SinkError> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(SinkError::Unavailable(format!(
                "Invalid asset extension: {:?}",
                extension
            )));
        }

        // Directory may have been removed since startup
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            SinkError::Unavailable(format!("{}: {}", self.base_path.display(), e))
        })?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        Ok(self.base_path.join(filename))
    }
}
