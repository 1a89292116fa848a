use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LogParams {
    #[serde(rename = "type")]
    pub log_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminLogResponse {
    pub id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "log_type")]
    pub log_type: String,
    pub message: String,
    pub actor_user_id: Option<i64>,
    pub meta: Option<sqlx::types::Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/logs", get(list_logs))
}

/// The audit trail, newest first, filterable by log type and a datetime
/// range. Unparseable bounds are treated as absent rather than rejected.
async fn list_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<AdminLogResponse>>, ApiError> {
    if !auth.role.can_view_logs() {
        return Err(ApiError::Forbidden);
    }

    let from_bound = params.from.as_deref().and_then(parse_lenient);
    // Bump the upper bound so a bound given to whole-second precision
    // still includes rows within that second.
    let to_bound = params
        .to
        .as_deref()
        .and_then(parse_lenient)
        .map(|dt| dt + chrono::Duration::microseconds(1));

    let logs = sqlx::query_as::<_, AdminLogResponse>(
        "SELECT id, log_type, message, actor_user_id, meta, created_at
         FROM admin_logs
         WHERE (?1 IS NULL OR log_type = ?1)
           AND (?2 IS NULL OR created_at >= ?2)
           AND (?3 IS NULL OR created_at <= ?3)
         ORDER BY created_at DESC, id DESC",
    )
    .bind(&params.log_type)
    .bind(from_bound)
    .bind(to_bound)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(logs))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Accepts RFC 3339, naive `YYYY-MM-DD[T| ]HH:MM:SS[.frac]`, or a bare
/// date (midnight). Naive values are read as UTC.
fn parse_lenient(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = input.parse::<NaiveDate>() {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
