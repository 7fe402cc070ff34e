use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::{CurrentUser, require_scope};
use crate::api::types::MessageResponse;
use crate::services::MediaItem;

/// GET /api/projects/{project}/media
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<Vec<MediaItem>>>, ApiError> {
    require_scope(&user, &project, "content.read")?;

    let items = state.shared.media.list(&project)?;

    Ok(Json(ApiResponse::success(items)))
}

/// POST /api/projects/{project}/media
/// Multipart upload. Each file part becomes one media item; the part name
/// (or a fresh UUID) is the item id, and re-using an id replaces the item.
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<MediaItem>>>, ApiError> {
    require_scope(&user, &project, "media.write")?;

    let mut items = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(ToString::to_string) else {
            continue;
        };

        let id = match field.name() {
            Some(name) if !name.is_empty() && name != "file" => name.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

        // stage first, then move into place, so a failed read never leaves
        // a half-written media item
        let staged = state.shared.uploads.stage(&project, &filename, &data).await?;
        state
            .shared
            .media
            .set_from_staged(&project, &id, &staged)
            .await?;

        let name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(filename);

        tracing::info!(project, id, name, "Media item stored");
        items.push(MediaItem { id, name });
    }

    if items.is_empty() {
        return Err(ApiError::validation("No file parts in upload"));
    }

    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/projects/{project}/media/{id}
/// Streams the media file itself.
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    require_scope(&user, &project, "content.read")?;

    let path = state
        .shared
        .media
        .get(&project, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Media", &id))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read media file: {e}")))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        Body::from(bytes),
    )
        .into_response())
}

/// DELETE /api/projects/{project}/media/{id}
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_scope(&user, &project, "media.write")?;

    state.shared.media.remove(&project, &id).await?;

    tracing::info!(project, id, "Media item deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Media item deleted".to_string(),
    })))
}
