use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new().route("/roles/get-roles", get(get_roles))
}

/// Role catalog used by registration forms. Open endpoint.
async fn get_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    let roles = sqlx::query_as::<_, RoleResponse>("SELECT id, name FROM roles ORDER BY id")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(roles))
}
