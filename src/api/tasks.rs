use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::helpers;
use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub project_id: Option<i64>,
    pub assigned_to_id: i64,
    pub status: Option<String>,
    pub progress: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub progress: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TaskResponse {
    pub id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub progress: i64,
    pub assigned_to_id: i64,
    pub assigned_by_id: i64,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

const TASK_COLUMNS: &str = "id, project_id, title, description, status, progress, \
     assigned_to_id, assigned_by_id, due_date, created_at, updated_at";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task/assign-task", post(assign_task))
        .route("/task/my-tasks/{user_id}", get(my_tasks))
        .route("/task/task-status/{task_id}", patch(update_status))
        .route("/task/task-progress/{task_id}", patch(update_progress))
}

#[tracing::instrument(
    skip(state, body),
    fields(user_id = auth.id, assigned_to_id = body.assigned_to_id)
)]
async fn assign_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AssignTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    if !auth.role.can_manage_tasks() {
        return Err(ApiError::Forbidden);
    }

    validation::check_length("title", &body.title, 1, 255)?;
    let status = body.status.unwrap_or_else(|| "pending".to_owned());
    validation::check_status("status", &status, validation::TASK_STATUSES)?;
    let progress = body.progress.unwrap_or(0);
    validation::check_progress(progress)?;

    helpers::require_user(&state.pool, body.assigned_to_id, "User").await?;
    if let Some(project_id) = body.project_id {
        helpers::require_project(&state.pool, project_id).await?;
    }

    let task = sqlx::query_as::<_, TaskResponse>(&format!(
        "INSERT INTO tasks
             (project_id, title, description, status, progress,
              assigned_to_id, assigned_by_id, due_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(body.project_id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(&status)
    .bind(progress)
    .bind(body.assigned_to_id)
    .bind(auth.id)
    .bind(body.due_date)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(task_id = task.id, "task assigned");
    Ok((StatusCode::CREATED, Json(task)))
}

/// Tasks assigned to one user, newest first. Users read their own list;
/// managerial roles may read anyone's.
async fn my_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    if auth.id != user_id && !auth.role.can_manage_tasks() {
        return Err(ApiError::Forbidden);
    }

    let tasks = sqlx::query_as::<_, TaskResponse>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE assigned_to_id = ?
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(tasks))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id, task_id))]
async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    validation::check_status("status", &body.status, validation::TASK_STATUSES)?;
    authorize_task_edit(&state, &auth, task_id).await?;

    let task = sqlx::query_as::<_, TaskResponse>(&format!(
        "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? RETURNING {TASK_COLUMNS}"
    ))
    .bind(&body.status)
    .bind(Utc::now())
    .bind(task_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(task))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id, task_id))]
async fn update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<i64>,
    Json(body): Json<UpdateProgressRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    validation::check_progress(body.progress)?;
    authorize_task_edit(&state, &auth, task_id).await?;

    let task = sqlx::query_as::<_, TaskResponse>(&format!(
        "UPDATE tasks SET progress = ?, updated_at = ? WHERE id = ? RETURNING {TASK_COLUMNS}"
    ))
    .bind(body.progress)
    .bind(Utc::now())
    .bind(task_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// A task may be edited by its assignee or by a managerial role. Missing
/// tasks are a 404 before any permission verdict.
async fn authorize_task_edit(
    state: &AppState,
    auth: &AuthUser,
    task_id: i64,
) -> Result<(), ApiError> {
    let assigned_to_id: Option<i64> =
        sqlx::query_scalar("SELECT assigned_to_id FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&state.pool)
            .await?;
    let Some(assigned_to_id) = assigned_to_id else {
        return Err(ApiError::NotFound("Task not found".into()));
    };
    if auth.id != assigned_to_id && !auth.role.can_manage_tasks() {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
