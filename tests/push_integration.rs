mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;
use wiremock::matchers;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Device push delivery through the FCM-compatible gateway.
//
// Each test points the app at a wiremock server, so no external gateway is
// needed. Pushes are sent inline by the handlers, so by the time a request
// returns the mock has already seen (or not seen) the delivery.
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn project_assignment_pushes_to_registered_device(pool: SqlitePool) {
    let mock_server = MockServer::start().await;
    let state =
        helpers::test_state_with_push(pool.clone(), &mock_server.uri(), Some("push-key-1")).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate_token) =
        helpers::create_user(&app, &admin, &pool, "cand@example.com", "candidate").await;

    let (status, body) = helpers::post_json(
        &app,
        &candidate_token,
        "/user/update-token",
        json!({ "fcm_token": "device-token-123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/"))
        .and(matchers::header("Authorization", "key=push-key-1"))
        .and(matchers::header("User-Agent", "InternHub-Push/1.0"))
        .and(matchers::body_json(json!({
            "to": "device-token-123",
            "notification": {
                "title": "New project assignment",
                "body": "You have been assigned to project Push Pilot.",
            },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let project_id = helpers::create_project(&app, &admin, "Push Pilot").await;
    helpers::assign_project(&app, &admin, candidate_id, project_id).await;

    mock_server.verify().await;

    // The in-app notification is written alongside the push.
    let notification_type: String = sqlx::query_scalar(
        "SELECT notification_type FROM notifications WHERE user_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(candidate_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(notification_type, "assignment");
}

#[sqlx::test(migrations = "./migrations")]
async fn no_device_token_means_no_push(pool: SqlitePool) {
    let mock_server = MockServer::start().await;
    let state =
        helpers::test_state_with_push(pool.clone(), &mock_server.uri(), Some("push-key-1")).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, _) =
        helpers::create_user(&app, &admin, &pool, "cand@example.com", "candidate").await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let project_id = helpers::create_project(&app, &admin, "Quiet Launch").await;
    helpers::assign_project(&app, &admin, candidate_id, project_id).await;

    mock_server.verify().await;

    let notifications: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
        .bind(candidate_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(notifications, 1, "in-app notification still lands");
}

#[sqlx::test(migrations = "./migrations")]
async fn push_is_skipped_when_gateway_is_unconfigured(pool: SqlitePool) {
    let mock_server = MockServer::start().await;
    let state = helpers::test_state_with_push(pool.clone(), &mock_server.uri(), None).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate_token) =
        helpers::create_user(&app, &admin, &pool, "cand@example.com", "candidate").await;

    let (status, _) = helpers::post_json(
        &app,
        &candidate_token,
        "/user/update-token",
        json!({ "fcm_token": "device-token-456" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let project_id = helpers::create_project(&app, &admin, "No Gateway").await;
    helpers::assign_project(&app, &admin, candidate_id, project_id).await;

    mock_server.verify().await;
}

#[sqlx::test(migrations = "./migrations")]
async fn gateway_errors_never_break_the_request(pool: SqlitePool) {
    let mock_server = MockServer::start().await;
    let state =
        helpers::test_state_with_push(pool.clone(), &mock_server.uri(), Some("push-key-1")).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate_token) =
        helpers::create_user(&app, &admin, &pool, "cand@example.com", "candidate").await;

    let (status, _) = helpers::post_json(
        &app,
        &candidate_token,
        "/user/update-token",
        json!({ "fcm_token": "device-token-789" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Delivery is best effort: the assignment itself still succeeds.
    let project_id = helpers::create_project(&app, &admin, "Flaky Gateway").await;
    helpers::assign_project(&app, &admin, candidate_id, project_id).await;

    mock_server.verify().await;
}
