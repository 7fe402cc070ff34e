//! Domain service for authentication, sessions, and per-project scopes.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to authentication and user management.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses. Never carries credential material.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub is_admin: bool,
    pub scopes: std::collections::BTreeMap<String, Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserInfo {
    /// Whether this user may perform `scope` on `project`. Admins are
    /// authorized everywhere.
    #[must_use]
    pub fn can(&self, project: &str, scope: &str) -> bool {
        if self.is_admin {
            return true;
        }

        self.scopes
            .get(project)
            .is_some_and(|s| s.iter().any(|v| v == scope))
    }
}

impl From<&crate::models::User> for UserInfo {
    fn from(user: &crate::models::User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            is_admin: user.is_admin,
            scopes: user.scopes.clone(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// Login result: the bearer token plus the authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: UserInfo,
}

/// Domain service trait for authentication and user management.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a fresh bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown username or
    /// a wrong password; the two are indistinguishable to the caller.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Resolves a bearer token to its user, or `None` for unknown/expired
    /// tokens. Expired tokens encountered during the scan are purged.
    async fn resolve_token(&self, token: &str) -> Result<Option<UserInfo>, AuthError>;

    /// Revokes one session by token key. Revoking an unknown token is a no-op.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    /// Creates a user, optionally with initial scopes on one project.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the username is taken, unless the
    /// supplied password matches the existing user's credential — in that
    /// case the scopes are merged instead (invite-to-another-project flow).
    async fn create_user(
        &self,
        username: &str,
        full_name: &str,
        password: &str,
        project: Option<&str>,
        scopes: &[String],
    ) -> Result<UserInfo, AuthError>;

    /// Lists users, optionally only those scoped to `project`.
    async fn list_users(&self, project: Option<&str>) -> Result<Vec<UserInfo>, AuthError>;

    async fn get_user(&self, id: &str) -> Result<UserInfo, AuthError>;

    async fn delete_user(&self, id: &str) -> Result<(), AuthError>;

    /// Rotates a user's password and revokes all of their sessions.
    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Grants `scopes` on `project`, merging with any existing grant.
    async fn grant_scopes(
        &self,
        user_id: &str,
        project: &str,
        scopes: &[String],
    ) -> Result<UserInfo, AuthError>;

    /// Removes a user's access to `project`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the user is the only one scoped
    /// to the project — a project must never lose its last authorized user.
    async fn revoke_project_scope(&self, user_id: &str, project: &str)
    -> Result<(), AuthError>;

    /// Promotes a user to admin, creating them first when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for an empty username, or an empty
    /// password when the user has to be created first.
    async fn make_admin(&self, username: &str, password: &str) -> Result<UserInfo, AuthError>;

    /// Force-revokes every session of a user.
    async fn revoke_tokens(&self, user_id: &str) -> Result<(), AuthError>;
}
