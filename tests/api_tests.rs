use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use hashbrown_cms::config::Config;
use http_body_util::BodyExt;
use tower::ServiceExt;

const ADMIN_USER: &str = "admin";
const ADMIN_PASS: &str = "correct-horse";

/// Spins up a full app on an in-memory database with a seeded admin.
/// The `TempDir` must outlive the test; it holds the storage root.
async fn spawn_app() -> (Router, tempfile::TempDir) {
    let storage = tempfile::tempdir().expect("Failed to create temp storage dir");

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.storage.root_path = storage.path().to_string_lossy().into_owned();
    config.backup.remote_config_path = storage
        .path()
        .join("backup.toml")
        .to_string_lossy()
        .into_owned();

    let state = hashbrown_cms::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");

    state
        .shared
        .auth
        .make_admin(ADMIN_USER, ADMIN_PASS)
        .await
        .expect("Failed to seed admin");

    (hashbrown_cms::api::router(state).await, storage)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let body = serde_json::json!({ "username": username, "password": password });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["data"]["token"].as_str().unwrap().to_string()
}

async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (app, _storage) = spawn_app().await;

    let (status, _) = request_json(&app, "GET", "/api/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request_json(&app, "GET", "/api/users", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_and_me() {
    let (app, _storage) = spawn_app().await;

    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, json) = request_json(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], ADMIN_USER);
    assert_eq!(json["data"]["is_admin"], true);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (app, _storage) = spawn_app().await;

    let body = serde_json::json!({ "username": ADMIN_USER, "password": "wrong" });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let (app, _storage) = spawn_app().await;

    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, _) = request_json(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scoped_user_lifecycle() {
    let (app, _storage) = spawn_app().await;
    let admin_token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    // admin invites alice to proj1 with read access only
    let (status, json) = request_json(
        &app,
        "POST",
        "/api/users",
        Some(&admin_token),
        Some(serde_json::json!({
            "username": "alice",
            "full_name": "Alice",
            "password": "alice-secret",
            "project": "proj1",
            "scopes": ["content.read"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alice_id = json["data"]["id"].as_str().unwrap().to_string();

    let alice_token = login(&app, "alice", "alice-secret").await;

    // reading proj1 works, writing does not, other projects are invisible
    let (status, _) = request_json(
        &app,
        "GET",
        "/api/projects/proj1/content",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app,
        "POST",
        "/api/projects/proj1/content",
        Some(&alice_token),
        Some(serde_json::json!({ "schema_id": "page", "title": "Home" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request_json(
        &app,
        "GET",
        "/api/projects/proj2/content",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admin grants write, now creation succeeds
    let (status, _) = request_json(
        &app,
        "POST",
        &format!("/api/users/{alice_id}/scopes/proj1"),
        Some(&admin_token),
        Some(serde_json::json!({ "scopes": ["content.write"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request_json(
        &app,
        "POST",
        "/api/projects/proj1/content",
        Some(&alice_token),
        Some(serde_json::json!({ "schema_id": "page", "title": "Home" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["title"], "Home");
}

#[tokio::test]
async fn test_create_user_rejects_taken_username() {
    let (app, _storage) = spawn_app().await;
    let admin_token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let payload = serde_json::json!({
        "username": "bob",
        "password": "bob-secret",
        "project": "proj1",
        "scopes": ["content.read"]
    });

    let (status, _) =
        request_json(&app, "POST", "/api/users", Some(&admin_token), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    // same username, different password: hard conflict
    let (status, _) = request_json(
        &app,
        "POST",
        "/api/users",
        Some(&admin_token),
        Some(serde_json::json!({
            "username": "bob",
            "password": "different",
            "project": "proj2",
            "scopes": ["content.read"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // same username and password: treated as an invite, scopes merge
    let (status, json) = request_json(
        &app,
        "POST",
        "/api/users",
        Some(&admin_token),
        Some(serde_json::json!({
            "username": "bob",
            "password": "bob-secret",
            "project": "proj2",
            "scopes": ["content.read"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["scopes"]["proj1"].is_array());
    assert!(json["data"]["scopes"]["proj2"].is_array());
}

#[tokio::test]
async fn test_cannot_remove_last_scoped_user() {
    let (app, _storage) = spawn_app().await;
    let admin_token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, json) = request_json(
        &app,
        "POST",
        "/api/users",
        Some(&admin_token),
        Some(serde_json::json!({
            "username": "carol",
            "password": "carol-secret",
            "project": "proj1",
            "scopes": ["content.read"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let carol_id = json["data"]["id"].as_str().unwrap().to_string();

    // carol is the only user scoped to proj1
    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/users/{carol_id}/scopes/proj1"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // once dave also has access, carol can be removed
    let (status, _) = request_json(
        &app,
        "POST",
        "/api/users",
        Some(&admin_token),
        Some(serde_json::json!({
            "username": "dave",
            "password": "dave-secret",
            "project": "proj1",
            "scopes": ["content.read"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/users/{carol_id}/scopes/proj1"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_content_crud() {
    let (app, _storage) = spawn_app().await;
    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, json) = request_json(
        &app,
        "POST",
        "/api/projects/site/content",
        Some(&token),
        Some(serde_json::json!({
            "schema_id": "article",
            "title": "Hello",
            "properties": { "body": "First post" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = request_json(
        &app,
        "GET",
        &format!("/api/projects/site/content/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["properties"]["body"], "First post");

    let (status, json) = request_json(
        &app,
        "PUT",
        &format!("/api/projects/site/content/{id}"),
        Some(&token),
        Some(serde_json::json!({
            "schema_id": "article",
            "title": "Hello again",
            "properties": { "body": "Edited" },
            "published": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["published"], true);

    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/projects/site/content/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app,
        "GET",
        &format!("/api/projects/site/content/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_backup_lifecycle_over_api() {
    let (app, _storage) = spawn_app().await;
    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, _) = request_json(
        &app,
        "POST",
        "/api/projects/site/content",
        Some(&token),
        Some(serde_json::json!({ "schema_id": "article", "title": "Keep me" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request_json(
        &app,
        "POST",
        "/api/projects/site/backups",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let timestamp = json["data"]["timestamp"].as_str().unwrap().to_string();

    let (status, json) = request_json(
        &app,
        "GET",
        "/api/projects/site/backups",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        json["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|b| b["timestamp"] == timestamp.as_str())
    );

    // wipe the content, then restore from the archive
    let (status, json) = request_json(
        &app,
        "GET",
        "/api/projects/site/content",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = json["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/projects/site/content/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app,
        "POST",
        &format!("/api/projects/site/backups/{timestamp}/restore"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request_json(
        &app,
        "GET",
        "/api/projects/site/content",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["title"], "Keep me");

    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/projects/site/backups/{timestamp}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request_json(
        &app,
        "DELETE",
        &format!("/api/projects/site/backups/{timestamp}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password_revokes_sessions() {
    let (app, _storage) = spawn_app().await;
    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, _) = request_json(
        &app,
        "PUT",
        "/api/auth/password",
        Some(&token),
        Some(serde_json::json!({
            "current_password": ADMIN_PASS,
            "new_password": "even-more-correct"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // old token is gone with the password change
    let (status, _) = request_json(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let _ = login(&app, ADMIN_USER, "even-more-correct").await;
}

#[tokio::test]
async fn test_malformed_remote_config_does_not_block_startup() {
    let storage = tempfile::tempdir().unwrap();
    let remote_path = storage.path().join("backup.toml");
    tokio::fs::write(&remote_path, "url = [ this is not toml")
        .await
        .unwrap();

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.storage.root_path = storage.path().to_string_lossy().into_owned();
    config.backup.remote_config_path = remote_path.to_string_lossy().into_owned();

    // a broken remote-storage config disables remote features only; the
    // daemon itself must still come up and serve requests
    let state = hashbrown_cms::api::create_app_state_from_config(config, None)
        .await
        .expect("startup must survive a malformed remote config");

    state
        .shared
        .auth
        .make_admin(ADMIN_USER, ADMIN_PASS)
        .await
        .unwrap();

    let app = hashbrown_cms::api::router(state).await;
    let token = login(&app, ADMIN_USER, ADMIN_PASS).await;

    let (status, _) = request_json(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_system_status_is_public() {
    let (app, _storage) = spawn_app().await;

    let (status, json) = request_json(&app, "GET", "/api/system/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "running");
    assert_eq!(json["data"]["database"], "ok");
}
