#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use internhub::config::Config;
use internhub::store::AppState;

/// Build a test `AppState` from the given pool.
///
/// - Bootstraps roles and the admin user (password = "testpassword")
/// - Uses a throwaway upload directory
/// - Push gateway is unconfigured, so no network traffic leaves the test
pub async fn test_state(pool: SqlitePool) -> AppState {
    test_state_with_push(pool, "http://127.0.0.1:9/unused", None).await
}

/// `test_state` with an explicit push gateway, for wiremock-backed tests.
pub async fn test_state_with_push(
    pool: SqlitePool,
    push_endpoint: &str,
    push_key: Option<&str>,
) -> AppState {
    internhub::store::bootstrap::run(&pool, Some("testpassword"))
        .await
        .expect("bootstrap failed");

    let upload_dir = tempfile::tempdir().expect("tempdir").keep();

    let config = Config {
        listen: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        jwt_secret: "test-secret".into(),
        token_ttl_minutes: 30,
        admin_password: None,
        cors_origins: vec![],
        trusted_hosts: vec![],
        api_key_enabled: false,
        api_key: None,
        upload_dir,
        push_endpoint: push_endpoint.into(),
        push_key: push_key.map(str::to_owned),
    };

    AppState {
        pool,
        config: Arc::new(config),
    }
}

/// Build the full API router with the given state.
pub fn test_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(internhub::api::router())
        .with_state(state)
}

/// Login as the bootstrap admin user. Returns the bearer token.
pub async fn admin_login(app: &Router) -> String {
    login(app, "admin@localhost", "testpassword").await
}

/// Password login through the form endpoint. Returns the bearer token.
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = post_form(
        app,
        "/login",
        &[("username", email), ("password", password)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed for {email}: {body}");
    body["access_token"]
        .as_str()
        .expect("login response missing access_token")
        .to_owned()
}

/// Create a user via the admin API and log them in.
/// Returns `(user_id, token)`.
pub async fn create_user(
    app: &Router,
    admin_token: &str,
    pool: &SqlitePool,
    email: &str,
    role: &str,
) -> (i64, String) {
    let password = "testpass123";
    let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role)
        .fetch_one(pool)
        .await
        .expect("role not found");

    let (status, body) = post_json(
        app,
        admin_token,
        "/user/add-user",
        serde_json::json!({
            "email": email,
            "full_name": format!("Test {role}"),
            "password": password,
            "role_id": role_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create user failed: {body}");
    let user_id = body["id"].as_i64().expect("user id");

    let token = login(app, email, password).await;
    (user_id, token)
}

/// Create a project as the given caller. Returns the project id.
pub async fn create_project(app: &Router, token: &str, name: &str) -> i64 {
    let (status, body) = post_json(
        app,
        token,
        "/projects/create",
        serde_json::json!({ "name": name, "description": "test project" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create project failed: {body}");
    body["id"].as_i64().expect("project id")
}

/// Assign an intern to a project. Returns the assignment id.
pub async fn assign_project(app: &Router, token: &str, intern_id: i64, project_id: i64) -> i64 {
    let (status, body) = post_json(
        app,
        token,
        "/projects/assign_project",
        serde_json::json!({ "intern_id": intern_id, "project_id": project_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "assign project failed: {body}");
    body["id"].as_i64().expect("assignment id")
}

/// Send a GET request with Bearer auth.
pub async fn get_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(path);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a GET request and return the raw body with response headers,
/// for endpoints that do not answer with JSON (CSV exports).
pub async fn get_raw(app: &Router, token: &str, path: &str) -> (StatusCode, HeaderMap, String) {
    let mut builder = Request::builder().method("GET").uri(path);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

/// Send a POST request with Bearer auth and JSON body.
pub async fn post_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json");
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a POST request with a URL-encoded form body (no auth).
pub async fn post_form(app: &Router, path: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a POST request with a multipart/form-data body. `file` is an
/// optional `(filename, bytes)` pair sent under the `file` field.
pub async fn post_multipart(
    app: &Router,
    token: &str,
    path: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, Value) {
    let boundary = "internhub-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        );
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::from(body)).unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a PATCH request with Bearer auth and JSON body.
pub async fn patch_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri(path)
        .header("Content-Type", "application/json");
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a PUT request with Bearer auth and JSON body.
pub async fn put_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(path)
        .header("Content-Type", "application/json");
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a DELETE request with Bearer auth.
pub async fn delete_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("DELETE").uri(path);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Extract JSON body from a response.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
