use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::role::Role;
use crate::error::ApiError;
use crate::notify::dispatch::{self, NewNotification};
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub is_read: Option<bool>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct NotificationResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub notification_type: String,
    pub created_at: DateTime<Utc>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, is_read, notification_type, created_at";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list).post(create))
        .route(
            "/notifications/{notification_id}",
            axum::routing::patch(update).delete(delete),
        )
}

/// The caller's own inbox, newest first.
async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let rows = sqlx::query_as::<_, NotificationResponse>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(auth.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

/// Only admins and managers may address other users' inboxes.
#[tracing::instrument(skip(state, body), fields(user_id = auth.id, target = body.user_id))]
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    if body.user_id != auth.id && auth.require(&[Role::Admin, Role::Manager]).is_err() {
        return Err(ApiError::Forbidden);
    }
    validation::check_length("title", &body.title, 1, 255)?;
    validation::check_length("message", &body.message, 1, 5000)?;

    let id = dispatch::notify(
        &state,
        NewNotification {
            user_id: body.user_id,
            title: body.title,
            message: body.message,
            notification_type: body.notification_type.unwrap_or_else(|| "system".into()),
        },
    )
    .await?;

    let row = sqlx::query_as::<_, NotificationResponse>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// Mark read/unread. Owner only.
async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<i64>,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = ?")
        .bind(notification_id)
        .fetch_optional(&state.pool)
        .await?;
    let Some(owner) = owner else {
        return Err(ApiError::NotFound("Notification not found".into()));
    };
    if owner != auth.id {
        return Err(ApiError::Forbidden);
    }

    let row = sqlx::query_as::<_, NotificationResponse>(&format!(
        "UPDATE notifications SET is_read = COALESCE(?, is_read)
         WHERE id = ?
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(body.is_read)
    .bind(notification_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(row))
}

/// Remove a notification from the caller's inbox. Owner only.
async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = ?")
        .bind(notification_id)
        .fetch_optional(&state.pool)
        .await?;
    let Some(owner) = owner else {
        return Err(ApiError::NotFound("Notification not found".into()));
    };
    if owner != auth.id {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(notification_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Notification deleted successfully"
    })))
}
