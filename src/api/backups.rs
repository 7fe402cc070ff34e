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
use crate::api::types::{BackupDto, MessageResponse};

/// GET /api/projects/{project}/backups
pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<Vec<BackupDto>>>, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    let mut timestamps = state.shared.backups.list(&project).await?;
    timestamps.sort_by_key(|t| t.parse::<i64>().unwrap_or(i64::MAX));

    let dtos = timestamps
        .into_iter()
        .map(|timestamp| BackupDto { timestamp })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /api/projects/{project}/backups
/// Dumps the project to a new archive.
pub async fn create_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<BackupDto>>, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    let timestamp = state.shared.backups.create(&project).await?;

    Ok(Json(ApiResponse::success(BackupDto { timestamp })))
}

/// GET /api/projects/{project}/backups/{timestamp}
/// Downloads the archive file.
pub async fn download_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, timestamp)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    let path = state.shared.backups.path(&project, &timestamp).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read archive: {e}")))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{timestamp}.hba"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// POST /api/projects/{project}/backups/upload
/// Accepts an existing archive file and files it under its timestamp name.
pub async fn upload_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(project): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<BackupDto>>, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(ToString::to_string) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

        let staged = state
            .shared
            .uploads
            .stage_raw(&project, &filename, &data)
            .await?;

        let timestamp = state.shared.backups.accept_upload(&project, &staged).await?;

        return Ok(Json(ApiResponse::success(BackupDto { timestamp })));
    }

    Err(ApiError::validation("No file parts in upload"))
}

/// POST /api/projects/{project}/backups/{timestamp}/restore
/// Replaces the project's content with the archive's snapshot.
pub async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, timestamp)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    state.shared.backups.restore(&project, &timestamp).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Project restored from backup {timestamp}"),
    })))
}

/// DELETE /api/projects/{project}/backups/{timestamp}
pub async fn delete_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((project, timestamp)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require_scope(&user, &project, "backups.write")?;

    state.shared.backups.delete(&project, &timestamp).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Backup {timestamp} deleted"),
    })))
}
