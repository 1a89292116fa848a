use sqlx::SqlitePool;

pub struct AuditEntry<'a> {
    pub actor_user_id: i64,
    pub log_type: &'a str,
    pub message: &'a str,
    pub meta: Option<serde_json::Value>,
}

/// Write an admin log entry. Failures are logged and swallowed: the
/// business mutation has already committed and must not be rolled back
/// because its audit trail could not be written.
pub async fn write_log(pool: &SqlitePool, entry: &AuditEntry<'_>) {
    if let Err(e) = write_log_inner(pool, entry).await {
        tracing::warn!(
            error = %e,
            log_type = entry.log_type,
            "failed to write admin log entry"
        );
    }
}

async fn write_log_inner(pool: &SqlitePool, entry: &AuditEntry<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO admin_logs (actor_user_id, log_type, message, meta, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(entry.actor_user_id)
    .bind(entry.log_type)
    .bind(entry.message)
    .bind(entry.meta.as_ref().map(sqlx::types::Json))
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
