mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;

const LEAVES_HEADER: &str =
    "Leave ID,User ID,User Name,Start Date,End Date,Status,Reason,Created At,Updated At";
const USERS_HEADER: &str = "User ID,Email,Full Name,Phone,Role ID,Role Name";

#[sqlx::test(migrations = "./migrations")]
async fn leaves_export_is_a_csv_attachment(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    let (_, candidate) =
        helpers::create_user(&app, &admin, &pool, "away@example.com", "candidate").await;

    helpers::post_json(
        &app,
        &candidate,
        "/leave/apply",
        json!({
            "start_date": "2026-09-01",
            "end_date": "2026-09-03",
            "reason": "sick, personal",
        }),
    )
    .await;

    let (status, headers, body) = helpers::get_raw(&app, &admin, "/export/leaves-csv").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "text/csv; charset=utf-8"
    );
    let disposition = headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=leaves_export_"));
    assert!(disposition.ends_with(".csv"));

    let lines: Vec<&str> = body.split("\r\n").collect();
    assert_eq!(lines[0], LEAVES_HEADER);
    assert_eq!(lines.len(), 3, "header + one row + trailing newline");
    assert_eq!(lines[2], "");

    let row = lines[1];
    assert!(row.contains("Test candidate"));
    assert!(row.contains("2026-09-01,2026-09-03,pending"));
    assert!(
        row.contains("\"sick, personal\""),
        "comma in reason forces quoting: {row}"
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn empty_leaves_export_is_just_the_header(pool: SqlitePool) {
    let state = helpers::test_state(pool).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;

    let (status, _, body) = helpers::get_raw(&app, &admin, "/export/leaves-csv").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("{LEAVES_HEADER}\r\n"));
}

#[sqlx::test(migrations = "./migrations")]
async fn users_export_lists_the_directory(pool: SqlitePool) {
    let state = helpers::test_state(pool.clone()).await;
    let app = helpers::test_router(state);
    let admin = helpers::admin_login(&app).await;
    helpers::create_user(&app, &admin, &pool, "dir@example.com", "pm").await;

    let (status, headers, body) = helpers::get_raw(&app, &admin, "/export/users-csv").await;

    assert_eq!(status, StatusCode::OK);
    let disposition = headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=users_export_"));

    let lines: Vec<&str> = body.split("\r\n").collect();
    assert_eq!(lines[0], USERS_HEADER);
    assert_eq!(lines.len(), 4, "header + admin + pm + trailing newline");
    assert!(lines[1].contains("admin@localhost"));
    assert!(lines[1].ends_with(",admin"), "role name column: {}", lines[1]);
    assert!(lines[2].contains("dir@example.com"));
    assert!(lines[2].ends_with(",pm"));
}

#[sqlx::test(migrations = "./migrations")]
async fn exports_require_authentication(pool: SqlitePool) {
    let state = helpers::test_state(pool).await;
    let app = helpers::test_router(state);

    for path in ["/export/leaves-csv", "/export/users-csv"] {
        let (status, _, _) = helpers::get_raw(&app, "", path).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
    }
}
