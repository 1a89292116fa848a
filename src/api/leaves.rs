use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditEntry};
use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApplyLeaveRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusParams {
    pub leave_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LeaveResponse {
    pub id: i64,
    pub user_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

const LEAVE_COLUMNS: &str =
    "id, user_id, start_date, end_date, reason, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leave/apply", post(apply))
        .route("/leave/my", get(my_leaves))
        .route("/leave/all", get(all_leaves))
        .route("/leave/update-status", patch(update_status))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id))]
async fn apply(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ApplyLeaveRequest>,
) -> Result<(StatusCode, Json<LeaveResponse>), ApiError> {
    validation::check_date_order(body.start_date, body.end_date)?;

    let leave = sqlx::query_as::<_, LeaveResponse>(&format!(
        "INSERT INTO leaves (user_id, start_date, end_date, reason, status, created_at)
         VALUES (?, ?, ?, ?, 'pending', ?)
         RETURNING {LEAVE_COLUMNS}"
    ))
    .bind(auth.id)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(&body.reason)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(leave_id = leave.id, "leave requested");
    Ok((StatusCode::CREATED, Json(leave)))
}

async fn my_leaves(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<LeaveResponse>>, ApiError> {
    let leaves = sqlx::query_as::<_, LeaveResponse>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(auth.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(leaves))
}

async fn all_leaves(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<LeaveResponse>>, ApiError> {
    if !auth.role.can_review_leaves() {
        return Err(ApiError::Forbidden);
    }
    let leaves = sqlx::query_as::<_, LeaveResponse>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(leaves))
}

/// Approve or reject a leave request. The target is addressed by the
/// `leave_id` query parameter.
#[tracing::instrument(
    skip(state, body),
    fields(user_id = auth.id, leave_id = params.leave_id, status = %body.status)
)]
async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<UpdateStatusParams>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<LeaveResponse>, ApiError> {
    if !auth.role.can_review_leaves() {
        return Err(ApiError::Forbidden);
    }
    validation::check_status("status", &body.status, validation::LEAVE_STATUSES)?;

    let leave = sqlx::query_as::<_, LeaveResponse>(&format!(
        "UPDATE leaves SET status = ?, updated_at = ? WHERE id = ? RETURNING {LEAVE_COLUMNS}"
    ))
    .bind(&body.status)
    .bind(Utc::now())
    .bind(params.leave_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Leave not found".into()))?;

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "leave_status",
            message: "Leave status updated",
            meta: Some(serde_json::json!({
                "leave_id": leave.id,
                "user_id": leave.user_id,
                "status": leave.status,
            })),
        },
    )
    .await;

    Ok(Json(leave))
}
