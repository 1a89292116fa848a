use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct LeaveExportRow {
    id: i64,
    user_id: i64,
    user_name: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserExportRow {
    id: i64,
    email: String,
    full_name: String,
    phone: Option<String>,
    role_id: i64,
    role_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export/leaves-csv", get(leaves_csv))
        .route("/export/users-csv", get(users_csv))
}

/// All leave requests as a CSV attachment.
async fn leaves_csv(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, LeaveExportRow>(
        "SELECT l.id, l.user_id, u.full_name AS user_name,
                l.start_date, l.end_date, l.status, l.reason,
                l.created_at, l.updated_at
         FROM leaves l
         LEFT JOIN users u ON u.id = l.user_id
         ORDER BY l.id",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut lines = vec![csv_line(&[
        "Leave ID", "User ID", "User Name", "Start Date", "End Date", "Status", "Reason",
        "Created At", "Updated At",
    ])];
    for row in &rows {
        lines.push(csv_line(&[
            &row.id.to_string(),
            &row.user_id.to_string(),
            row.user_name.as_deref().unwrap_or("N/A"),
            &row.start_date.format("%Y-%m-%d").to_string(),
            &row.end_date.format("%Y-%m-%d").to_string(),
            &row.status,
            row.reason.as_deref().unwrap_or(""),
            &format_timestamp(row.created_at),
            &row.updated_at.map(format_timestamp).unwrap_or_default(),
        ]));
    }

    Ok(csv_attachment("leaves_export", lines))
}

/// The user directory as a CSV attachment.
async fn users_csv(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, UserExportRow>(
        "SELECT u.id, u.email, u.full_name, u.phone, u.role_id, r.name AS role_name
         FROM users u
         LEFT JOIN roles r ON r.id = u.role_id
         ORDER BY u.id",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut lines = vec![csv_line(&[
        "User ID", "Email", "Full Name", "Phone", "Role ID", "Role Name",
    ])];
    for row in &rows {
        lines.push(csv_line(&[
            &row.id.to_string(),
            &row.email,
            &row.full_name,
            row.phone.as_deref().unwrap_or(""),
            &row.role_id.to_string(),
            row.role_name.as_deref().unwrap_or("N/A"),
        ]));
    }

    Ok(csv_attachment("users_export", lines))
}

// ---------------------------------------------------------------------------
// CSV rendering
// ---------------------------------------------------------------------------

/// Quote a field when it contains a delimiter, quote, or line break;
/// embedded quotes are doubled (RFC 4180).
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn csv_attachment(prefix: &str, lines: Vec<String>) -> impl IntoResponse {
    let mut body = lines.join("\r\n");
    body.push_str("\r\n");
    let filename = format!("{prefix}_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
}
