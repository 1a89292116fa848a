use axum::extract::{Form, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{password, rate_limit, token};
use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LoginLookup {
    email: String,
    hashed_password: String,
    role_name: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Password login. Accepts a URL-encoded form and returns a bearer token
/// carrying the account's role.
#[tracing::instrument(skip(state, form), fields(username = %form.username))]
async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, ApiError> {
    // 5 attempts per account name per minute, tracked in the database so
    // every replica enforces the same window.
    rate_limit::check_rate(&state.pool, "login", &form.username, 5, 60).await?;

    let account = sqlx::query_as::<_, LoginLookup>(
        "SELECT u.email, u.hashed_password, r.name AS role_name
         FROM users u
         JOIN roles r ON r.id = u.role_id
         WHERE u.email = ?",
    )
    .bind(&form.username)
    .fetch_optional(&state.pool)
    .await?;

    // Verify against a dummy hash for unknown accounts so response timing
    // does not reveal whether the email exists.
    let hash = account
        .as_ref()
        .map_or_else(|| password::dummy_hash().to_owned(), |a| a.hashed_password.clone());
    let password_ok =
        password::verify_password(&form.password, &hash).map_err(ApiError::Internal)?;

    let Some(account) = account.filter(|_| password_ok) else {
        return Err(ApiError::Unauthorized);
    };

    let access_token = token::create(
        &state.config.jwt_secret,
        &account.email,
        &account.role_name,
        state.config.token_ttl_minutes,
    )?;

    tracing::info!(email = %account.email, role = %account.role_name, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".into(),
        role: account.role_name,
    }))
}
