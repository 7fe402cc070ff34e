use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod backups;
mod content;
mod error;
mod media;
mod observability;
mod system;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };

    let protected_routes = create_protected_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth::auth_middleware,
    ));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/login", post(auth::login))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/scopes/{project}", post(users::grant_scopes))
        .route(
            "/users/{id}/scopes/{project}",
            delete(users::revoke_project_scope),
        )
        .route("/users/{username}/admin", post(users::make_admin))
        .route("/projects/{project}/content", get(content::list_content))
        .route("/projects/{project}/content", post(content::create_content))
        .route(
            "/projects/{project}/content/{id}",
            get(content::get_content),
        )
        .route(
            "/projects/{project}/content/{id}",
            put(content::update_content),
        )
        .route(
            "/projects/{project}/content/{id}",
            delete(content::delete_content),
        )
        .route("/projects/{project}/media", get(media::list_media))
        .route("/projects/{project}/media", post(media::upload_media))
        .route("/projects/{project}/media/{id}", get(media::get_media))
        .route(
            "/projects/{project}/media/{id}",
            delete(media::delete_media),
        )
        .route("/projects/{project}/backups", get(backups::list_backups))
        .route("/projects/{project}/backups", post(backups::create_backup))
        .route(
            "/projects/{project}/backups/upload",
            post(backups::upload_backup),
        )
        .route(
            "/projects/{project}/backups/{timestamp}",
            get(backups::download_backup),
        )
        .route(
            "/projects/{project}/backups/{timestamp}",
            delete(backups::delete_backup),
        )
        .route(
            "/projects/{project}/backups/{timestamp}/restore",
            post(backups::restore_backup),
        )
}
