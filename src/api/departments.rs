use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::role::Role;
use crate::error::{self, ApiError};
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MapHrRequest {
    pub hr_id: i64,
    pub department_id: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DepartmentResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HrMappingResponse {
    pub id: i64,
    pub hr_id: i64,
    pub department_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HrUserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/departments", get(list_departments).post(create_department))
        .route(
            "/departments/{department_id}",
            get(get_department)
                .patch(update_department)
                .delete(delete_department),
        )
        .route("/departments/map_hr", post(map_hr))
        .route(
            "/departments/hr_by_department/{department_id}",
            get(hr_by_department),
        )
}

async fn list_departments(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<DepartmentResponse>>, ApiError> {
    let departments = sqlx::query_as::<_, DepartmentResponse>(
        "SELECT id, name, description, created_at FROM departments ORDER BY id",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(departments))
}

async fn get_department(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(department_id): Path<i64>,
) -> Result<Json<DepartmentResponse>, ApiError> {
    let department = sqlx::query_as::<_, DepartmentResponse>(
        "SELECT id, name, description, created_at FROM departments WHERE id = ?",
    )
    .bind(department_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;
    Ok(Json(department))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id, name = %body.name))]
async fn create_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<DepartmentResponse>), ApiError> {
    validation::check_length("name", &body.name, 1, 255)?;

    let department = sqlx::query_as::<_, DepartmentResponse>(
        "INSERT INTO departments (name, description, created_at)
         VALUES (?, ?, ?)
         RETURNING id, name, description, created_at",
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "Department with this name already exists"))?;

    Ok((StatusCode::CREATED, Json(department)))
}

#[tracing::instrument(skip(state, body), fields(user_id = auth.id, department_id))]
async fn update_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(department_id): Path<i64>,
    Json(body): Json<UpdateDepartmentRequest>,
) -> Result<Json<DepartmentResponse>, ApiError> {
    if let Some(name) = body.name.as_deref() {
        validation::check_length("name", name, 1, 255)?;
    }

    let department = sqlx::query_as::<_, DepartmentResponse>(
        "UPDATE departments
         SET name = COALESCE(?, name), description = COALESCE(?, description)
         WHERE id = ?
         RETURNING id, name, description, created_at",
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(department_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "Department with this name already exists"))?
    .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;

    Ok(Json(department))
}

/// Department delete removes its HR mappings in the same transaction so the
/// mapping table never holds dangling department references.
#[tracing::instrument(skip(state), fields(user_id = auth.id, department_id))]
async fn delete_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(department_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    sqlx::query("DELETE FROM hr_department_map WHERE department_id = ?")
        .bind(department_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("Department not found".into()));
    }
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "message": "Department deleted successfully"
    })))
}

/// Attach an HR user to a department. Admin only; the target must actually
/// hold the hr role.
#[tracing::instrument(
    skip(state),
    fields(user_id = auth.id, hr_id = body.hr_id, department_id = body.department_id)
)]
async fn map_hr(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<MapHrRequest>,
) -> Result<(StatusCode, Json<HrMappingResponse>), ApiError> {
    auth.require(&[Role::Admin])?;

    let hr_role: Option<String> = sqlx::query_scalar(
        "SELECT r.name FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = ?",
    )
    .bind(body.hr_id)
    .fetch_optional(&state.pool)
    .await?;
    let is_hr = matches!(
        hr_role.as_deref().map(|name| name.parse::<Role>()),
        Some(Ok(Role::Hr))
    );
    if !is_hr {
        return Err(ApiError::BadRequest("Provided hr_id is not an HR user".into()));
    }

    let department_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM departments WHERE id = ?")
        .bind(body.department_id)
        .fetch_optional(&state.pool)
        .await?;
    if department_exists.is_none() {
        return Err(ApiError::NotFound("Department not found".into()));
    }

    let mapping = sqlx::query_as::<_, HrMappingResponse>(
        "INSERT INTO hr_department_map (hr_id, department_id, created_at)
         VALUES (?, ?, ?)
         RETURNING id, hr_id, department_id, created_at",
    )
    .bind(body.hr_id)
    .bind(body.department_id)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "HR already mapped to this department"))?;

    Ok((StatusCode::CREATED, Json(mapping)))
}

async fn hr_by_department(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(department_id): Path<i64>,
) -> Result<Json<Vec<HrUserResponse>>, ApiError> {
    let hrs = sqlx::query_as::<_, HrUserResponse>(
        "SELECT u.id, u.email, u.full_name
         FROM users u
         JOIN hr_department_map m ON m.hr_id = u.id
         WHERE m.department_id = ?
         ORDER BY u.id",
    )
    .bind(department_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(hrs))
}
