mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;

#[sqlx::test(migrations = "./migrations")]
async fn manager_assigns_task_with_defaults(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (_, manager) =
        helpers::create_user(&app, &admin, &pool, "manager@example.com", "manager").await;
    let (candidate_id, _) =
        helpers::create_user(&app, &admin, &pool, "worker@example.com", "candidate").await;

    let (status, body) = helpers::post_json(
        &app,
        &manager,
        "/task/assign-task",
        json!({
            "title": "Write onboarding notes",
            "assigned_to_id": candidate_id,
            "due_date": "2026-09-15",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["title"], "Write onboarding notes");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["progress"].as_i64(), Some(0));
    assert_eq!(body["assigned_to_id"].as_i64(), Some(candidate_id));
    assert_eq!(body["due_date"], "2026-09-15");
    assert_eq!(body["updated_at"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "./migrations")]
async fn candidates_cannot_assign_tasks(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate) =
        helpers::create_user(&app, &admin, &pool, "worker@example.com", "candidate").await;

    let (status, _) = helpers::post_json(
        &app,
        &candidate,
        "/task/assign-task",
        json!({ "title": "Nope", "assigned_to_id": candidate_id }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn assign_task_validates_inputs(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, _) =
        helpers::create_user(&app, &admin, &pool, "worker@example.com", "candidate").await;

    let (status, _) = helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "x", "assigned_to_id": candidate_id, "status": "doing" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unknown status");

    let (status, _) = helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "x", "assigned_to_id": candidate_id, "progress": 150 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "progress out of range");

    let (status, body) = helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "x", "assigned_to_id": 9999 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");

    let (status, body) = helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "x", "assigned_to_id": candidate_id, "project_id": 9999 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Project not found");
}

#[sqlx::test(migrations = "./migrations")]
async fn task_lists_are_private_to_non_managers(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (first_id, first_token) =
        helpers::create_user(&app, &admin, &pool, "first@example.com", "candidate").await;
    let (second_id, second_token) =
        helpers::create_user(&app, &admin, &pool, "second@example.com", "candidate").await;

    helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "First's task", "assigned_to_id": first_id }),
    )
    .await;

    let (status, body) =
        helpers::get_json(&app, &first_token, &format!("/task/my-tasks/{first_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) =
        helpers::get_json(&app, &second_token, &format!("/task/my-tasks/{first_id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        helpers::get_json(&app, &admin, &format!("/task/my-tasks/{second_id}")).await;
    assert_eq!(status, StatusCode::OK, "managers may read any list");
    assert!(body.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn assignee_updates_status_and_progress(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate) =
        helpers::create_user(&app, &admin, &pool, "worker@example.com", "candidate").await;
    let (_, bystander) =
        helpers::create_user(&app, &admin, &pool, "bystander@example.com", "candidate").await;

    let (_, task) = helpers::post_json(
        &app,
        &admin,
        "/task/assign-task",
        json!({ "title": "Ship it", "assigned_to_id": candidate_id }),
    )
    .await;
    let task_id = task["id"].as_i64().unwrap();

    let (status, body) = helpers::patch_json(
        &app,
        &candidate,
        &format!("/task/task-status/{task_id}"),
        json!({ "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "approved");
    assert!(body["updated_at"].is_string());

    let (status, body) = helpers::patch_json(
        &app,
        &candidate,
        &format!("/task/task-progress/{task_id}"),
        json!({ "progress": 60 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"].as_i64(), Some(60));

    // Another candidate may touch neither.
    let (status, _) = helpers::patch_json(
        &app,
        &bystander,
        &format!("/task/task-status/{task_id}"),
        json!({ "status": "rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = helpers::patch_json(
        &app,
        &candidate,
        &format!("/task/task-progress/{task_id}"),
        json!({ "progress": 101 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = helpers::patch_json(
        &app,
        &candidate,
        "/task/task-status/9999",
        json!({ "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found");
}

#[sqlx::test(migrations = "./migrations")]
async fn leave_application_starts_pending(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (candidate_id, candidate) =
        helpers::create_user(&app, &admin, &pool, "away@example.com", "candidate").await;

    let (status, body) = helpers::post_json(
        &app,
        &candidate,
        "/leave/apply",
        json!({ "start_date": "2026-09-01", "end_date": "2026-09-03", "reason": "family visit" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user_id"].as_i64(), Some(candidate_id));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["reason"], "family visit");

    let (status, body) = helpers::post_json(
        &app,
        &candidate,
        "/leave/apply",
        json!({ "start_date": "2026-09-03", "end_date": "2026-09-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "end_date must not be before start_date");
}

#[sqlx::test(migrations = "./migrations")]
async fn leave_lists_respect_roles(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (_, hr) = helpers::create_user(&app, &admin, &pool, "hr@example.com", "hr").await;
    let (_, first) =
        helpers::create_user(&app, &admin, &pool, "first@example.com", "candidate").await;
    let (_, second) =
        helpers::create_user(&app, &admin, &pool, "second@example.com", "candidate").await;

    for (token, start, end) in [
        (&first, "2026-09-01", "2026-09-02"),
        (&second, "2026-09-05", "2026-09-06"),
    ] {
        helpers::post_json(
            &app,
            token,
            "/leave/apply",
            json!({ "start_date": start, "end_date": end }),
        )
        .await;
    }

    let (status, body) = helpers::get_json(&app, &first, "/leave/my").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1, "own leaves only");

    let (status, body) = helpers::get_json(&app, &hr, "/leave/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = helpers::get_json(&app, &first, "/leave/all").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn hr_reviews_leave_requests(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (_, hr) = helpers::create_user(&app, &admin, &pool, "hr@example.com", "hr").await;
    let (_, candidate) =
        helpers::create_user(&app, &admin, &pool, "away@example.com", "candidate").await;

    let (_, leave) = helpers::post_json(
        &app,
        &candidate,
        "/leave/apply",
        json!({ "start_date": "2026-09-01", "end_date": "2026-09-03" }),
    )
    .await;
    let leave_id = leave["id"].as_i64().unwrap();

    // Candidates cannot review, not even their own request.
    let (status, _) = helpers::patch_json(
        &app,
        &candidate,
        &format!("/leave/update-status?leave_id={leave_id}"),
        json!({ "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = helpers::patch_json(
        &app,
        &hr,
        &format!("/leave/update-status?leave_id={leave_id}"),
        json!({ "status": "maybe" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = helpers::patch_json(
        &app,
        &hr,
        &format!("/leave/update-status?leave_id={leave_id}"),
        json!({ "status": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "approved");
    assert!(body["updated_at"].is_string());

    let (status, body) = helpers::patch_json(
        &app,
        &hr,
        "/leave/update-status?leave_id=9999",
        json!({ "status": "rejected" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Leave not found");

    let logged: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM admin_logs WHERE log_type = 'leave_status'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(logged, 1);
}
