pub mod apply;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::store::AppState;

/// One row of the offline sync queue. Serialized as-is in sync API
/// responses.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
pub struct QueueItem {
    pub id: i64,
    pub user_id: i64,
    pub operation_type: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub data: sqlx::types::Json<serde_json::Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Per-item processing result reported back to the client.
#[derive(Debug)]
pub struct SyncOutcome {
    pub success: bool,
    pub record_id: Option<i64>,
    pub message: String,
}

/// Append a mutation to the caller's queue in `pending` state.
pub async fn enqueue(
    pool: &SqlitePool,
    user_id: i64,
    operation_type: &str,
    table_name: &str,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> Result<i64, ApiError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO sync_queue
             (user_id, operation_type, table_name, record_id, data, status, created_at)
         VALUES (?, ?, ?, ?, ?, 'pending', ?)
         RETURNING id",
    )
    .bind(user_id)
    .bind(operation_type)
    .bind(table_name)
    .bind(record_id)
    .bind(sqlx::types::Json(data))
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Run one queued item through its lifecycle:
/// `pending -> processing -> completed | failed`.
///
/// The business mutation and the `completed` status update commit in one
/// transaction; a failed apply rolls that transaction back and records the
/// error on the row, leaving business data untouched. One item's failure
/// never affects its siblings in a batch.
pub async fn process_item(state: &AppState, user: &AuthUser, item_id: i64) -> SyncOutcome {
    if let Err(e) =
        sqlx::query("UPDATE sync_queue SET status = 'processing', updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(item_id)
            .execute(&state.pool)
            .await
    {
        return SyncOutcome {
            success: false,
            record_id: None,
            message: format!("queue update failed: {e}"),
        };
    }

    let item: QueueItem = match sqlx::query_as("SELECT * FROM sync_queue WHERE id = ?")
        .bind(item_id)
        .fetch_one(&state.pool)
        .await
    {
        Ok(item) => item,
        Err(e) => {
            return SyncOutcome {
                success: false,
                record_id: None,
                message: format!("queue item {item_id} unavailable: {e}"),
            };
        }
    };

    match apply_in_tx(state, user, &item).await {
        Ok(record_id) => SyncOutcome {
            success: true,
            record_id: record_id.or(item.record_id),
            message: format!("{} on {} applied", item.operation_type, item.table_name),
        },
        Err(e) => {
            let message = e.to_string();
            tracing::debug!(item_id, error = %message, "sync item failed");
            let _ = sqlx::query(
                "UPDATE sync_queue SET status = 'failed', error_message = ?,
                     retry_count = retry_count + 1, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&message)
            .bind(Utc::now())
            .bind(item.id)
            .execute(&state.pool)
            .await;
            SyncOutcome {
                success: false,
                record_id: None,
                message,
            }
        }
    }
}

async fn apply_in_tx(
    state: &AppState,
    user: &AuthUser,
    item: &QueueItem,
) -> anyhow::Result<Option<i64>> {
    let mut tx = state.pool.begin().await?;

    let record_id = apply::dispatch(&mut tx, user, item).await?;

    let now = Utc::now();
    sqlx::query(
        "UPDATE sync_queue SET status = 'completed', record_id = COALESCE(?1, record_id),
             error_message = NULL, updated_at = ?2, synced_at = ?2
         WHERE id = ?3",
    )
    .bind(record_id)
    .bind(now)
    .bind(item.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::role::Role;
    use crate::config::Config;

    fn state_for(pool: SqlitePool) -> AppState {
        AppState {
            pool,
            config: Arc::new(Config::load()),
        }
    }

    async fn seed_admin(pool: &SqlitePool) -> AuthUser {
        crate::store::bootstrap::run(pool, None).await.unwrap();
        let id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = 'admin@localhost'")
            .fetch_one(pool)
            .await
            .unwrap();
        AuthUser {
            id,
            email: "admin@localhost".into(),
            full_name: "Administrator".into(),
            role: Role::Admin,
            fcm_token: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn leave_create_completes_and_commits(pool: SqlitePool) {
        let user = seed_admin(&pool).await;
        let state = state_for(pool);

        let data = serde_json::json!({
            "start_date": "2026-03-02",
            "end_date": "2026-03-04",
            "reason": "travel"
        });
        let item_id = enqueue(&state.pool, user.id, "create", "leaves", None, &data)
            .await
            .unwrap();

        let outcome = process_item(&state, &user, item_id).await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.record_id.is_some());

        let (status, record_id): (String, Option<i64>) =
            sqlx::query_as("SELECT status, record_id FROM sync_queue WHERE id = ?")
                .bind(item_id)
                .fetch_one(&state.pool)
                .await
                .unwrap();
        assert_eq!(status, "completed");
        assert_eq!(record_id, outcome.record_id);

        let leaves: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leaves WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(leaves, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unsupported_table_fails_with_message(pool: SqlitePool) {
        let user = seed_admin(&pool).await;
        let state = state_for(pool);

        let item_id = enqueue(
            &state.pool,
            user.id,
            "create",
            "unicorns",
            None,
            &serde_json::json!({}),
        )
        .await
        .unwrap();

        let outcome = process_item(&state, &user, item_id).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("unsupported table"));

        let (status, error): (String, Option<String>) =
            sqlx::query_as("SELECT status, error_message FROM sync_queue WHERE id = ?")
                .bind(item_id)
                .fetch_one(&state.pool)
                .await
                .unwrap();
        assert_eq!(status, "failed");
        assert!(error.unwrap().contains("unsupported table"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn failed_item_commits_no_business_rows(pool: SqlitePool) {
        let user = seed_admin(&pool).await;
        let state = state_for(pool);

        // end before start fails the apply; no leave row may survive it
        let data = serde_json::json!({
            "start_date": "2026-03-10",
            "end_date": "2026-03-01"
        });
        let item_id = enqueue(&state.pool, user.id, "create", "leaves", None, &data)
            .await
            .unwrap();

        let outcome = process_item(&state, &user, item_id).await;
        assert!(!outcome.success);

        let leaves: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leaves")
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(leaves, 0);
    }
}
