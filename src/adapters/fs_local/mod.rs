// Local filesystem adapter - File system operations through tokio::fs

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::*;
use crate::ports::*;

/// Local filesystem adapter
#[derive(Debug, Clone, Default)]
pub struct LocalFsAdapter;

impl LocalFsAdapter {
    /// Create new local filesystem adapter
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FsPort for LocalFsAdapter {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DomainError> {
        tokio::fs::remove_file(path).await.map_err(|e| {
            DomainError::IoFailure(format!("Failed to delete {}: {}", path.display(), e))
        })?;
        debug!("Deleted {}", path.display());
        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(path).await.map_err(|e| {
            DomainError::IoFailure(format!("Failed to create directory {}: {}", path.display(), e))
        })
    }
}
