use axum::extract::{Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditEntry};
use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;
use crate::sync::{self, QueueItem};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OfflineBatchRequest {
    pub items: Vec<OfflineItem>,
}

#[derive(Debug, Deserialize)]
pub struct OfflineItem {
    pub operation_type: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct QueueItemsParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub total_items: i64,
    pub pending_items: i64,
    pub completed_items: i64,
    pub failed_items: i64,
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RetryResult {
    pub queue_id: i64,
    pub success: bool,
    pub message: String,
    pub synced_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/offline_data", post(offline_data))
        .route("/sync/queue_status", get(queue_status))
        .route("/sync/queue_items", get(queue_items))
        .route("/sync/retry_failed", post(retry_failed))
        .route("/sync/clear_completed", delete(clear_completed))
}

/// Drain a client's offline mutation batch. Every item is queued and then
/// applied immediately; the response carries the final queue rows, so the
/// client can see which items completed and which failed and why.
#[tracing::instrument(skip(state, body), fields(user_id = auth.id, items = body.items.len()))]
async fn offline_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<OfflineBatchRequest>,
) -> Result<Json<Vec<QueueItem>>, ApiError> {
    let total_items = body.items.len();
    let mut successful_items = 0_usize;
    let mut failed_items = 0_usize;
    let mut rows = Vec::with_capacity(total_items);

    for item in &body.items {
        let item_id = sync::enqueue(
            &state.pool,
            auth.id,
            &item.operation_type,
            &item.table_name,
            item.record_id,
            &item.data,
        )
        .await?;

        let outcome = sync::process_item(&state, &auth, item_id).await;
        if outcome.success {
            successful_items += 1;
        } else {
            failed_items += 1;
        }

        let row: QueueItem = sqlx::query_as("SELECT * FROM sync_queue WHERE id = ?")
            .bind(item_id)
            .fetch_one(&state.pool)
            .await?;
        rows.push(row);
    }

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "offline_sync",
            message: &format!("Offline data sync completed: {total_items} items"),
            meta: Some(serde_json::json!({
                "total_items": total_items,
                "successful_items": successful_items,
                "failed_items": failed_items,
            })),
        },
    )
    .await;

    Ok(Json(rows))
}

/// Queue counters for the caller plus the time of the last finished attempt.
async fn queue_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let (total_items, pending_items, completed_items, failed_items): (i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'pending'), 0),
                    COALESCE(SUM(status = 'completed'), 0),
                    COALESCE(SUM(status = 'failed'), 0)
             FROM sync_queue WHERE user_id = ?",
        )
        .bind(auth.id)
        .fetch_one(&state.pool)
        .await?;

    let last_sync_attempt: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(updated_at) FROM sync_queue
         WHERE user_id = ? AND status IN ('completed', 'failed')",
    )
    .bind(auth.id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(QueueStatusResponse {
        total_items,
        pending_items,
        completed_items,
        failed_items,
        last_sync_attempt,
    }))
}

/// The caller's queue rows, newest first, optionally filtered by status.
async fn queue_items(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<QueueItemsParams>,
) -> Result<Json<Vec<QueueItem>>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);

    let rows: Vec<QueueItem> = sqlx::query_as(
        "SELECT * FROM sync_queue
         WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )
    .bind(auth.id)
    .bind(&params.status)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

/// Re-run every failed item the caller owns. Each reset is committed before
/// the retry so a crash mid-batch leaves the rest pending, not failed.
#[tracing::instrument(skip(state), fields(user_id = auth.id))]
async fn retry_failed(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<RetryResult>>, ApiError> {
    let failed_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM sync_queue WHERE user_id = ? AND status = 'failed' ORDER BY id",
    )
    .bind(auth.id)
    .fetch_all(&state.pool)
    .await?;

    let mut results = Vec::with_capacity(failed_ids.len());
    for item_id in failed_ids {
        sqlx::query(
            "UPDATE sync_queue SET status = 'pending', error_message = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(item_id)
        .execute(&state.pool)
        .await?;

        let outcome = sync::process_item(&state, &auth, item_id).await;
        results.push(RetryResult {
            queue_id: item_id,
            success: outcome.success,
            message: outcome.message,
            synced_at: Utc::now(),
        });
    }

    Ok(Json(results))
}

/// Drop the caller's completed rows from the queue.
async fn clear_completed(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = sqlx::query("DELETE FROM sync_queue WHERE user_id = ? AND status = 'completed'")
        .bind(auth.id)
        .execute(&state.pool)
        .await?
        .rows_affected();

    Ok(Json(serde_json::json!({
        "message": format!("Cleared {cleared} completed sync items")
    })))
}
