use axum::{
    Extension, Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::types::{ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse};
use crate::services::auth_service::UserInfo;

/// The authenticated user, inserted into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserInfo);

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware. Accepts the bearer token from either:
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-Auth-Token` header
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_token(&headers) else {
        return Err(ApiError::unauthorized("Missing authentication token"));
    };

    let user = state
        .shared
        .auth
        .resolve_token(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    tracing::Span::current().record("user_id", &user.username);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    if let Some(token) = headers.get("X-Auth-Token")
        && let Ok(token_str) = token.to_str()
    {
        return Some(token_str.to_string());
    }

    None
}

/// Rejects the request unless the caller holds `scope` on `project`.
/// Admins pass every check.
pub fn require_scope(user: &UserInfo, project: &str, scope: &str) -> Result<(), ApiError> {
    if user.can(project, scope) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Missing scope \"{scope}\" on project \"{project}\""
        )))
    }
}

/// Rejects the request unless the caller is an admin.
pub fn require_admin(user: &UserInfo) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Authenticate with username and password, returns a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .shared
        .auth
        .login(&payload.username, &payload.password)
        .await?;

    tracing::info!("User logged in: {}", payload.username);

    Ok(Json(ApiResponse::success(LoginResponse {
        token: result.token,
        user: result.user,
    })))
}

/// POST /api/auth/logout
/// Revoke the token the request was authenticated with.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if let Some(token) = extract_token(&headers) {
        state.shared.auth.logout(&token).await?;
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    })))
}

/// GET /api/auth/me
/// Current user info.
pub async fn get_current_user(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(ApiResponse::success(user))
}

/// PUT /api/auth/password
/// Change the caller's password. Revokes every session on success.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth
        .change_password(
            &user.username,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    tracing::info!("Password changed for user: {}", user.username);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}
