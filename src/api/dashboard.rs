use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::auth::role::Role;
use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CeoMetricsResponse {
    pub total_projects: i64,
    pub total_tasks: i64,
    pub pending_leaves: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusSummaryResponse {
    pub task_status_summary: BTreeMap<String, i64>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/ceo-metrics", get(ceo_metrics))
        .route("/dashboard/task-status-summary", get(task_status_summary))
}

/// Company-wide headline counts. CEO only.
async fn ceo_metrics(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CeoMetricsResponse>, ApiError> {
    auth.require(&[Role::Ceo])?;

    let total_projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(&state.pool)
        .await?;
    let total_tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&state.pool)
        .await?;
    let pending_leaves: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leaves WHERE status = 'pending'")
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(CeoMetricsResponse {
        total_projects,
        total_tasks,
        pending_leaves,
    }))
}

/// Task counts grouped by lifecycle status. CEO only.
async fn task_status_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<TaskStatusSummaryResponse>, ApiError> {
    auth.require(&[Role::Ceo])?;

    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(TaskStatusSummaryResponse {
        task_status_summary: rows.into_iter().collect(),
    }))
}
