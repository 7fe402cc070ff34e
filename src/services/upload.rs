//! Staging area for multipart uploads.
//!
//! Incoming files land in `{storage_root}/{project}/temp/` under their
//! normalized name before the owning handler moves them to their final home
//! (media directory or backup dump directory).

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::services::media::{is_safe_component, normalize_filename};

pub struct UploadService {
    root: PathBuf,
}

impl UploadService {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn temp_dir(&self, project: &str) -> Result<PathBuf> {
        if !is_safe_component(project) {
            anyhow::bail!("Invalid project name \"{project}\"");
        }

        Ok(self.root.join(project).join("temp"))
    }

    /// Writes `data` to the project's staging directory and returns the
    /// staged path. The filename is normalized on the way in.
    pub async fn stage(&self, project: &str, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.temp_dir(project)?;

        let name = normalize_filename(filename);
        if !is_safe_component(&name) {
            anyhow::bail!("Invalid file name \"{filename}\"");
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .context("Failed to create staging directory")?;

        let path = dir.join(name);
        tokio::fs::write(&path, data)
            .await
            .context("Failed to write staged upload")?;

        Ok(path)
    }

    /// Stages a backup archive upload, keeping its name verbatim. Archive
    /// names are validated downstream against the timestamp format.
    pub async fn stage_raw(&self, project: &str, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.temp_dir(project)?;

        let name = std::path::Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("Upload has no file name"))?;
        if !is_safe_component(&name) {
            anyhow::bail!("Invalid file name \"{filename}\"");
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .context("Failed to create staging directory")?;

        let path = dir.join(name);
        tokio::fs::write(&path, data)
            .await
            .context("Failed to write staged upload")?;

        Ok(path)
    }
}
