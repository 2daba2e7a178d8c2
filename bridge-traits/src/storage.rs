//! File System Abstraction
//!
//! Provides a platform-agnostic trait for the file I/O the cache needs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
    pub is_directory: bool,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn is_playable(fs: &dyn FileSystemAccess, path: &Path) -> bool {
///     match fs.metadata(path).await {
///         Ok(meta) => meta.size > 0,
///         Err(_) => false,
///     }
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for streaming writes, truncating any existing content
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;

    /// Size of a file, or 0 if it cannot be inspected
    async fn file_size_or_zero(&self, path: &Path) -> u64 {
        self.metadata(path).await.map(|m| m.size).unwrap_or(0)
    }
}
