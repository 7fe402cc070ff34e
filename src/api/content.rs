use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::{CurrentUser, require_scope};
use crate::api::types::{ContentDto, ContentRequest, MessageResponse};
use crate::models::ContentEntry;

/// GET /api/projects/{project}/content
pub async fn list_content(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<Vec<ContentDto>>>, ApiError> {
    require_scope(&user, &project, "content.read")?;

    let entries = state.shared.store.list_content(&project).await?;
    let dtos = entries.into_iter().map(ContentDto::from).collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /api/projects/{project}/content
pub async fn create_content(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<ApiResponse<ContentDto>>, ApiError> {
    require_scope(&user, &project, "content.write")?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let mut entry = ContentEntry::new(
        &project,
        &payload.schema_id,
        &payload.title,
        payload.properties,
    );
    entry.published = payload.published;

    state.shared.store.insert_content(&entry).await?;

    tracing::info!(project, id = %entry.id, "Content entry created");

    Ok(Json(ApiResponse::success(ContentDto::from(entry))))
}

/// GET /api/projects/{project}/content/{id}
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ContentDto>>, ApiError> {
    require_scope(&user, &project, "content.read")?;

    let entry = state
        .shared
        .store
        .get_content(&project, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Content entry", &id))?;

    Ok(Json(ApiResponse::success(ContentDto::from(entry))))
}

/// PUT /api/projects/{project}/content/{id}
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, id)): Path<(String, String)>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<ApiResponse<ContentDto>>, ApiError> {
    require_scope(&user, &project, "content.write")?;

    let mut entry = state
        .shared
        .store
        .get_content(&project, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Content entry", &id))?;

    entry.schema_id = payload.schema_id;
    entry.title = payload.title;
    entry.properties = payload.properties;
    entry.published = payload.published;

    if !state.shared.store.update_content(&entry).await? {
        return Err(ApiError::not_found("Content entry", &id));
    }

    tracing::info!(project, id = %entry.id, "Content entry updated");

    Ok(Json(ApiResponse::success(ContentDto::from(entry))))
}

/// DELETE /api/projects/{project}/content/{id}
pub async fn delete_content(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_scope(&user, &project, "content.write")?;

    if !state.shared.store.delete_content(&project, &id).await? {
        return Err(ApiError::not_found("Content entry", &id));
    }

    tracing::info!(project, id, "Content entry deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Content entry deleted".to_string(),
    })))
}
