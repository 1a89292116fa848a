use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::helpers;
use crate::auth::middleware::AuthUser;
use crate::error::{self, ApiError};
use crate::notify::dispatch;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignProjectRequest {
    pub intern_id: i64,
    pub project_id: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AssignmentResponse {
    pub id: i64,
    pub intern_id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub assigned_by_id: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/create", post(create_project))
        .route("/projects/list", get(list_projects))
        .route("/projects/assign_project", post(assign_project))
        .route("/projects/assignments/{intern_id}", get(list_assignments))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id, name = %body.name))]
async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    if !auth.role.can_manage_projects() {
        return Err(ApiError::Forbidden);
    }
    validation::check_length("name", &body.name, 1, 255)?;

    let project = sqlx::query_as::<_, ProjectResponse>(
        "INSERT INTO projects (name, description, created_at)
         VALUES (?, ?, ?)
         RETURNING id, name, description, created_at",
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "project with this name already exists"))?;

    tracing::info!(project_id = project.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let projects = sqlx::query_as::<_, ProjectResponse>(
        "SELECT id, name, description, created_at FROM projects ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(projects))
}

/// Put an intern on a project. Duplicate pairs are rejected, and the intern
/// gets a notification (plus a device push when they have a token).
#[tracing::instrument(
    skip(state),
    fields(user_id = auth.id, intern_id = body.intern_id, project_id = body.project_id)
)]
async fn assign_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AssignProjectRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    if !auth.role.can_assign_projects() {
        return Err(ApiError::Forbidden);
    }

    let intern = helpers::require_user(&state.pool, body.intern_id, "Intern").await?;
    let project = helpers::require_project(&state.pool, body.project_id).await?;

    let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        "INSERT INTO project_assignments (intern_id, project_id, assigned_by_id, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, created_at",
    )
    .bind(intern.id)
    .bind(project.id)
    .bind(auth.id)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "intern already assigned to this project"))?;

    dispatch::on_project_assigned(&state, intern.id, &project.name).await;

    Ok((
        StatusCode::CREATED,
        Json(AssignmentResponse {
            id,
            intern_id: intern.id,
            project_id: project.id,
            project_name: project.name,
            assigned_by_id: auth.id,
            created_at,
        }),
    ))
}

/// Assignments for one intern. Interns may read their own; assigner roles
/// may read anyone's.
async fn list_assignments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(intern_id): Path<i64>,
) -> Result<Json<Vec<AssignmentResponse>>, ApiError> {
    if auth.id != intern_id && !auth.role.can_assign_projects() {
        return Err(ApiError::Forbidden);
    }

    let assignments = sqlx::query_as::<_, AssignmentResponse>(
        "SELECT a.id, a.intern_id, a.project_id, p.name AS project_name,
                a.assigned_by_id, a.created_at
         FROM project_assignments a
         JOIN projects p ON p.id = a.project_id
         WHERE a.intern_id = ?
         ORDER BY a.created_at DESC, a.id DESC",
    )
    .bind(intern_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(assignments))
}
