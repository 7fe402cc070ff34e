//! Domain service for project backup archives.
//!
//! Archives live under `{storage_root}/{project}/dump/` and are named by
//! their millisecond epoch timestamp with an `.hba` extension. The payload
//! is the project's zstd-compressed JSON snapshot.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Errors specific to backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for BackupError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Optional remote storage settings, read from a standalone TOML file.
/// A missing file means local-only operation; a malformed one is an error.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStorageConfig {
    pub url: String,

    #[serde(default)]
    pub token: Option<String>,
}

/// Domain service trait for the backup lifecycle.
#[async_trait::async_trait]
pub trait BackupService: Send + Sync {
    /// Dumps the project to a new archive and returns its timestamp name.
    async fn create(&self, project: &str) -> Result<String, BackupError>;

    /// Timestamp names of all archives for the project, unsorted.
    async fn list(&self, project: &str) -> Result<Vec<String>, BackupError>;

    /// Replaces the project's content with the archive's snapshot. The
    /// archive is fully parsed and validated before anything is written.
    async fn restore(&self, project: &str, timestamp: &str) -> Result<(), BackupError>;

    async fn delete(&self, project: &str, timestamp: &str) -> Result<(), BackupError>;

    /// Filesystem path of an existing archive, for download handlers.
    async fn path(&self, project: &str, timestamp: &str) -> Result<PathBuf, BackupError>;

    /// Moves an uploaded archive (already staged on disk) into the dump
    /// directory. Returns the timestamp name it was filed under.
    async fn accept_upload(
        &self,
        project: &str,
        staged: &std::path::Path,
    ) -> Result<String, BackupError>;
}
