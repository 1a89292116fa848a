use sqlx::SqlitePool;

use crate::error::ApiError;

/// User row as referenced by other modules (assignments, evaluations,
/// feedback). `label` names the missing party in the 404 message, e.g.
/// "Intern" or "PM".
#[derive(Debug, sqlx::FromRow)]
pub struct UserBrief {
    pub id: i64,
    pub role_name: String,
}

pub async fn require_user(
    pool: &SqlitePool,
    user_id: i64,
    label: &str,
) -> Result<UserBrief, ApiError> {
    sqlx::query_as::<_, UserBrief>(
        "SELECT u.id, r.name AS role_name
         FROM users u
         JOIN roles r ON r.id = u.role_id
         WHERE u.id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("{label} not found")))
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProjectBrief {
    pub id: i64,
    pub name: String,
}

pub async fn require_project(pool: &SqlitePool, project_id: i64) -> Result<ProjectBrief, ApiError> {
    sqlx::query_as::<_, ProjectBrief>("SELECT id, name FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))
}
