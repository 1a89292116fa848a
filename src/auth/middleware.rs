use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sqlx::SqlitePool;

use crate::auth::role::Role;
use crate::auth::token;
use crate::error::ApiError;
use crate::store::AppState;

/// Authenticated user extracted from the bearer token.
///
/// The token only pins the account email; id, name and role come from a
/// live lookup so role changes and deleted accounts take effect on the
/// next request rather than at token expiry.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub fcm_token: Option<String>,
}

impl AuthUser {
    /// Allow-list gate used where a route is open to a fixed set of roles.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountLookup {
    id: i64,
    email: String,
    full_name: String,
    role_name: String,
    fcm_token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(raw_token) = extract_bearer_token(parts) else {
            return Err(ApiError::Unauthorized);
        };
        let claims = token::verify(&state.config.jwt_secret, &raw_token)?;

        let Some(account) = lookup_account(&state.pool, &claims.sub).await? else {
            return Err(ApiError::Unauthorized);
        };
        let role: Role = account
            .role_name
            .parse()
            .map_err(|e: anyhow::Error| ApiError::Internal(e))?;

        Ok(Self {
            id: account.id,
            email: account.email,
            full_name: account.full_name,
            role,
            fcm_token: account.fcm_token,
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}

async fn lookup_account(pool: &SqlitePool, email: &str) -> Result<Option<AccountLookup>, ApiError> {
    let row = sqlx::query_as::<_, AccountLookup>(
        "SELECT u.id, u.email, u.full_name, r.name AS role_name, u.fcm_token
         FROM users u
         JOIN roles r ON r.id = u.role_id
         WHERE u.email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
