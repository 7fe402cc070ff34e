use serde::{Deserialize, Serialize};

use crate::models::ContentEntry;
use crate::services::auth_service::UserInfo;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,

    #[serde(default)]
    pub full_name: String,

    pub password: String,

    /// Project the new user is initially invited to, with `scopes`.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantScopesRequest {
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub schema_id: String,

    pub title: String,

    #[serde(default)]
    pub properties: serde_json::Value,

    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Serialize)]
pub struct ContentDto {
    pub id: String,
    pub project: String,
    pub schema_id: String,
    pub title: String,
    pub properties: serde_json::Value,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ContentEntry> for ContentDto {
    fn from(entry: ContentEntry) -> Self {
        Self {
            id: entry.id,
            project: entry.project,
            schema_id: entry.schema_id,
            title: entry.title,
            properties: entry.properties,
            published: entry.published,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackupDto {
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: String,
}
