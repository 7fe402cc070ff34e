//! Media storage on the local filesystem.
//!
//! Each media item owns the directory `{storage_root}/{project}/media/{id}/`
//! holding exactly one file. Writing to an existing id replaces the whole
//! directory, so stale variants of a renamed file never linger.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Path segments taken from client input (project names, media ids, archive
/// timestamps) must be exactly one normal path component. Anything that
/// could climb out of its directory is rejected.
pub(crate) fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains('/')
        && !s.contains('\\')
        && !s.contains('\0')
}

/// One media item as listed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
}

pub struct MediaService {
    root: PathBuf,
}

impl MediaService {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn media_dir(&self, project: &str) -> PathBuf {
        self.root.join(project).join("media")
    }

    /// Resolves the item directory, refusing project names or ids that are
    /// not a single path component. Keeps every id inside its own project.
    fn item_dir(&self, project: &str, id: &str) -> Result<PathBuf, MediaError> {
        if !is_safe_component(project) {
            return Err(MediaError::Validation(format!(
                "Invalid project name \"{project}\""
            )));
        }
        if !is_safe_component(id) {
            return Err(MediaError::Validation(format!("Invalid media id \"{id}\"")));
        }

        Ok(self.media_dir(project).join(id))
    }

    /// Stores `data` as the single file of media item `id`, replacing any
    /// previous content of that item.
    pub async fn set(
        &self,
        project: &str,
        id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), MediaError> {
        let dir = self.item_dir(project, id)?;

        let name = normalize_filename(filename);
        if !is_safe_component(&name) {
            return Err(MediaError::Validation(format!(
                "Invalid file name \"{filename}\""
            )));
        }

        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join(name), data).await?;

        Ok(())
    }

    /// Moves an already-staged file into media item `id`, replacing any
    /// previous content. Used by the multipart upload path.
    pub async fn set_from_staged(
        &self,
        project: &str,
        id: &str,
        staged: &std::path::Path,
    ) -> Result<(), MediaError> {
        let dir = self.item_dir(project, id)?;

        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        let name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        tokio::fs::rename(staged, dir.join(name)).await?;

        Ok(())
    }

    /// Path of the item's file, or `None` when the item does not exist.
    pub async fn get(&self, project: &str, id: &str) -> Result<Option<PathBuf>, MediaError> {
        let dir = self.item_dir(project, id)?;

        if !dir.exists() {
            return Ok(None);
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                return Ok(Some(entry.path()));
            }
        }

        Ok(None)
    }

    /// All media items of a project, in directory order.
    pub fn list(&self, project: &str) -> Result<Vec<MediaItem>, MediaError> {
        if !is_safe_component(project) {
            return Err(MediaError::Validation(format!(
                "Invalid project name \"{project}\""
            )));
        }

        let dir = self.media_dir(project);

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();

        for entry in WalkDir::new(&dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let id = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());

            if let Some(id) = id {
                items.push(MediaItem {
                    id,
                    name: entry.file_name().to_string_lossy().into_owned(),
                });
            }
        }

        Ok(items)
    }

    pub async fn remove(&self, project: &str, id: &str) -> Result<(), MediaError> {
        let dir = self.item_dir(project, id)?;

        if !dir.exists() {
            return Err(MediaError::NotFound(id.to_string()));
        }

        tokio::fs::remove_dir_all(&dir).await?;

        Ok(())
    }
}

/// Normalizes an uploaded filename: the stem is lowercased with every run of
/// non-word characters collapsed to a single dash; the extension is kept
/// verbatim.
#[must_use]
pub fn normalize_filename(filename: &str) -> String {
    use std::sync::OnceLock;

    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\W+").expect("Invalid regex"));

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let clean = re.replace_all(stem, "-").to_lowercase();

    match ext {
        Some(ext) => format!("{clean}.{ext}"),
        None => clean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_name() {
        assert_eq!(normalize_filename("photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_normalize_collapses_non_word_runs() {
        assert_eq!(
            normalize_filename("My Summer -- Photo!.JPG"),
            "my-summer-photo-.JPG"
        );
    }

    #[test]
    fn test_normalize_lowercases_stem_only() {
        assert_eq!(normalize_filename("IMG_1234.PNG"), "img_1234.PNG");
    }

    #[test]
    fn test_normalize_without_extension() {
        assert_eq!(normalize_filename("Read Me"), "read-me");
    }

    #[test]
    fn test_normalize_keeps_only_last_extension() {
        assert_eq!(normalize_filename("archive.tar.gz"), "archive-tar.gz");
    }

    #[test]
    fn test_normalize_leading_dot() {
        // a leading dot leaves an empty stem, treated as no extension
        assert_eq!(normalize_filename(".hidden"), "-hidden");
    }

    #[test]
    fn test_safe_component_rejects_separators_and_dots() {
        assert!(is_safe_component("logo"));
        assert!(is_safe_component("1755900000000"));
        assert!(is_safe_component("img_1234.PNG"));

        assert!(!is_safe_component(""));
        assert!(!is_safe_component("."));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("../../site-b/media/secret"));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component("a\\b"));
    }
}
