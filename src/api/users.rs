use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::{CurrentUser, require_admin, require_scope};
use crate::api::types::{CreateUserRequest, GrantScopesRequest, ListUsersQuery, MessageResponse};
use crate::services::auth_service::UserInfo;

/// GET /api/users
/// Lists users, optionally filtered to one project. Per-project listing is
/// open to anyone holding `users.write` on that project; the full listing
/// is admin-only.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<UserInfo>>>, ApiError> {
    match &query.project {
        Some(project) => require_scope(&user, project, "users.write")?,
        None => require_admin(&user)?,
    }

    let users = state.shared.auth.list_users(query.project.as_deref()).await?;

    Ok(Json(ApiResponse::success(users)))
}

/// POST /api/users
/// Creates a user, optionally scoped to a project from day one. Inviting an
/// existing user (same username and password) merges the new scopes instead.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    match &payload.project {
        Some(project) => require_scope(&user, project, "users.write")?,
        None => require_admin(&user)?,
    }

    let created = state
        .shared
        .auth
        .create_user(
            &payload.username,
            &payload.full_name,
            &payload.password,
            payload.project.as_deref(),
            &payload.scopes,
        )
        .await?;

    tracing::info!("User created: {}", created.username);

    Ok(Json(ApiResponse::success(created)))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    // Everyone may read their own record; anything else needs admin
    if user.id != id {
        require_admin(&user)?;
    }

    let info = state.shared.auth.get_user(&id).await?;

    Ok(Json(ApiResponse::success(info)))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_admin(&user)?;

    state.shared.auth.delete_user(&id).await?;

    tracing::info!("User deleted: {id}");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deleted".to_string(),
    })))
}

/// POST /api/users/{id}/scopes/{project}
/// Grants scopes on a project.
pub async fn grant_scopes(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((id, project)): Path<(String, String)>,
    Json(payload): Json<GrantScopesRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    require_scope(&user, &project, "users.write")?;

    let updated = state
        .shared
        .auth
        .grant_scopes(&id, &project, &payload.scopes)
        .await?;

    tracing::info!("Scopes granted on {project} to user {id}");

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/users/{id}/scopes/{project}
/// Removes a user's access to a project. Refused when they are the last
/// user with access.
pub async fn revoke_project_scope(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((id, project)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_scope(&user, &project, "users.write")?;

    state.shared.auth.revoke_project_scope(&id, &project).await?;

    tracing::info!("Project {project} access revoked for user {id}");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Project access revoked".to_string(),
    })))
}

/// POST /api/users/{username}/admin
/// Promotes a user to admin. Admin-only.
pub async fn make_admin(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    require_admin(&user)?;

    let password = payload
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let promoted = state.shared.auth.make_admin(&username, password).await?;

    tracing::info!("User promoted to admin: {username}");

    Ok(Json(ApiResponse::success(promoted)))
}
