//! Content entries and the per-project snapshot consumed by backups.

use serde::{Deserialize, Serialize};

/// A single content entry inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: String,

    pub project: String,

    /// Identifier of the content schema this entry claims to follow.
    pub schema_id: String,

    pub title: String,

    /// Free-form field values, serialized as JSON.
    pub properties: serde_json::Value,

    pub published: bool,

    pub created_at: String,

    pub updated_at: String,
}

impl ContentEntry {
    #[must_use]
    pub fn new(project: &str, schema_id: &str, title: &str, properties: serde_json::Value) -> Self {
        let now = chrono::Utc::now().to_rfc3339();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project: project.to_string(),
            schema_id: schema_id.to_string(),
            title: title.to_string(),
            properties,
            published: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Full dump of one project's persisted state. Serialized to JSON and
/// zstd-compressed, this is the payload of an `.hba` archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: String,

    /// Millisecond epoch timestamp at dump time; also the archive name.
    pub created_at: i64,

    pub content: Vec<ContentEntry>,
}
