//! Filesystem implementation of the `BackupService` trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::Store;
use crate::models::ProjectSnapshot;
use crate::services::backup_service::{BackupError, BackupService, RemoteStorageConfig};
use crate::services::media::is_safe_component;

/// Archive file extension (without the dot).
const ARCHIVE_EXT: &str = "hba";

/// Compression level passed to zstd. Snapshots are JSON, so even the low
/// levels compress well.
const COMPRESSION_LEVEL: i32 = 3;

pub struct FsBackupService {
    store: Store,
    root: PathBuf,

    /// One lock per project. Dump and restore for the same project are
    /// serialized; different projects proceed in parallel.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsBackupService {
    #[must_use]
    pub fn new(store: Store, root: PathBuf) -> Self {
        Self {
            store,
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Project names and archive timestamps become path segments, so both
    /// must be a single normal path component.
    fn dump_dir(&self, project: &str) -> Result<PathBuf, BackupError> {
        if !is_safe_component(project) {
            return Err(BackupError::Validation(format!(
                "Invalid project name \"{project}\""
            )));
        }

        Ok(self.root.join(project).join("dump"))
    }

    fn archive_path(&self, project: &str, timestamp: &str) -> Result<PathBuf, BackupError> {
        if !is_safe_component(timestamp) {
            return Err(BackupError::Validation(format!(
                "Invalid archive name \"{timestamp}\""
            )));
        }

        Ok(self
            .dump_dir(project)?
            .join(format!("{timestamp}.{ARCHIVE_EXT}")))
    }

    async fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn decode_snapshot(bytes: &[u8]) -> Result<ProjectSnapshot, BackupError> {
        let json = zstd::decode_all(bytes)
            .map_err(|_| BackupError::Validation("Archive is corrupt".to_string()))?;

        serde_json::from_slice(&json)
            .map_err(|err| BackupError::Validation(format!("Archive is not a valid dump: {err}")))
    }
}

#[async_trait]
impl BackupService for FsBackupService {
    async fn create(&self, project: &str) -> Result<String, BackupError> {
        let dir = self.dump_dir(project)?;

        let lock = self.project_lock(project).await;
        let _guard = lock.lock().await;

        let snapshot = self.store.export_project(project).await?;
        let timestamp = snapshot.created_at.to_string();

        let json = serde_json::to_vec(&snapshot)
            .map_err(|err| BackupError::Internal(err.to_string()))?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?;

        tokio::fs::create_dir_all(&dir).await?;

        // Write to a sibling temp file, then rename. Readers never see a
        // half-written archive.
        let final_path = self.archive_path(project, &timestamp)?;
        let partial = dir.join(format!(".{timestamp}.{ARCHIVE_EXT}.partial"));
        tokio::fs::write(&partial, &compressed).await?;
        tokio::fs::rename(&partial, &final_path).await?;

        info!(project, timestamp, "Created backup archive");

        Ok(timestamp)
    }

    async fn list(&self, project: &str) -> Result<Vec<String>, BackupError> {
        let dir = self.dump_dir(project)?;

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut timestamps = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXT)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                timestamps.push(stem.to_string());
            }
        }

        Ok(timestamps)
    }

    async fn restore(&self, project: &str, timestamp: &str) -> Result<(), BackupError> {
        let path = self.archive_path(project, timestamp)?;

        let lock = self.project_lock(project).await;
        let _guard = lock.lock().await;

        if !path.exists() {
            return Err(BackupError::NotFound(timestamp.to_string()));
        }

        let bytes = tokio::fs::read(&path).await?;
        let snapshot = Self::decode_snapshot(&bytes)?;

        if snapshot.project != project {
            return Err(BackupError::Validation(format!(
                "Archive belongs to project \"{}\", not \"{project}\"",
                snapshot.project
            )));
        }

        // The snapshot is fully decoded by now; the swap itself runs in one
        // database transaction, so a failure leaves the previous state.
        self.store.import_project(&snapshot).await?;

        info!(project, timestamp, "Restored project from backup");

        Ok(())
    }

    async fn delete(&self, project: &str, timestamp: &str) -> Result<(), BackupError> {
        let path = self.archive_path(project, timestamp)?;

        if !path.exists() {
            return Err(BackupError::NotFound(timestamp.to_string()));
        }

        tokio::fs::remove_file(&path).await?;
        info!(project, timestamp, "Deleted backup archive");

        Ok(())
    }

    async fn path(&self, project: &str, timestamp: &str) -> Result<PathBuf, BackupError> {
        let path = self.archive_path(project, timestamp)?;

        if !path.exists() {
            return Err(BackupError::NotFound(timestamp.to_string()));
        }

        Ok(path)
    }

    async fn accept_upload(
        &self,
        project: &str,
        staged: &Path,
    ) -> Result<String, BackupError> {
        let stem = staged
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BackupError::Validation("Upload has no file name".to_string()))?;

        // Archive names are millisecond epoch timestamps, nothing else
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BackupError::Validation(format!(
                "\"{stem}\" is not a valid archive timestamp"
            )));
        }

        let dir = self.dump_dir(project)?;
        tokio::fs::create_dir_all(&dir).await?;

        let target = self.archive_path(project, stem)?;
        tokio::fs::rename(staged, &target).await?;

        info!(project, timestamp = stem, "Accepted uploaded backup archive");

        Ok(stem.to_string())
    }
}

/// Reads the optional remote storage config. A missing file is normal and
/// yields `None`; a file that exists but fails to parse is an error.
pub async fn load_remote_config(path: &Path) -> anyhow::Result<Option<RemoteStorageConfig>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No remote storage config, using local storage only");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    let config: RemoteStorageConfig = toml::from_str(&raw).map_err(|err| {
        warn!(path = %path.display(), "Malformed remote storage config");
        anyhow::anyhow!("Failed to parse remote storage config: {err}")
    })?;

    Ok(Some(config))
}
