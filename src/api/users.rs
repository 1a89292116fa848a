use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::auth::middleware::AuthUser;
use crate::auth::password;
use crate::auth::role::Role;
use crate::error::{self, ApiError};
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub password: String,
    pub role_name: String,
    pub fcm_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub password: String,
    pub role_id: i64,
    pub fcm_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTokenRequest {
    pub fcm_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/add-user", post(add_user))
        .route("/user/get-profile", get(get_profile))
        .route("/user/update-token", post(update_token))
}

/// Self-registration. Open endpoint; the requested role must name one of
/// the seeded roles.
#[tracing::instrument(skip(state, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validation::check_email(&body.email)?;
    validation::check_length("full_name", &body.full_name, 1, 255)?;
    validation::check_length("password", &body.password, 8, 1024)?;

    let role: Role = body
        .role_name
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role".into()))?;
    let role_id = role_id_by_name(&state.pool, role).await?;

    let user = insert_user(
        &state.pool,
        &body.email,
        &body.full_name,
        body.phone.as_deref(),
        &body.password,
        role_id,
        body.fcm_token.as_deref(),
        role.as_str(),
    )
    .await?;

    tracing::info!(user_id = user.id, role = %role, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Admin-only variant of registration that addresses the role by id.
#[tracing::instrument(skip(state, body), fields(admin_id = auth.id, email = %body.email))]
async fn add_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if !auth.role.is_admin() {
        return Err(ApiError::Forbidden);
    }

    validation::check_email(&body.email)?;
    validation::check_length("full_name", &body.full_name, 1, 255)?;
    validation::check_length("password", &body.password, 8, 1024)?;

    let role_name: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE id = ?")
        .bind(body.role_id)
        .fetch_optional(&state.pool)
        .await?;
    let Some(role_name) = role_name else {
        return Err(ApiError::BadRequest("Invalid role".into()));
    };

    let user = insert_user(
        &state.pool,
        &body.email,
        &body.full_name,
        body.phone.as_deref(),
        &body.password,
        body.role_id,
        body.fcm_token.as_deref(),
        &role_name,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Profile of the authenticated account.
async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let phone: Option<String> = sqlx::query_scalar("SELECT phone FROM users WHERE id = ?")
        .bind(auth.id)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(UserResponse {
        id: auth.id,
        email: auth.email,
        full_name: auth.full_name,
        phone,
        role: auth.role.to_string(),
    }))
}

/// Store a fresh device push token for the caller.
#[tracing::instrument(skip(state, body), fields(user_id = auth.id))]
async fn update_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    sqlx::query("UPDATE users SET fcm_token = ? WHERE id = ?")
        .bind(&body.fcm_token)
        .bind(auth.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(serde_json::json!({ "message": "FCM token updated successfully" })))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

async fn role_id_by_name(pool: &SqlitePool, role: Role) -> Result<i64, ApiError> {
    sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid role".into()))
}

#[allow(clippy::too_many_arguments)]
async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    full_name: &str,
    phone: Option<&str>,
    plain_password: &str,
    role_id: i64,
    fcm_token: Option<&str>,
    role_name: &str,
) -> Result<UserResponse, ApiError> {
    let hashed = password::hash_password(plain_password).map_err(ApiError::Internal)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, full_name, phone, hashed_password, role_id, fcm_token, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(email)
    .bind(full_name)
    .bind(phone)
    .bind(&hashed)
    .bind(role_id)
    .bind(fcm_token)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|err| error::on_unique_conflict(err, "Email already registered"))?;

    Ok(UserResponse {
        id,
        email: email.to_owned(),
        full_name: full_name.to_owned(),
        phone: phone.map(ToOwned::to_owned),
        role: role_name.to_owned(),
    })
}
