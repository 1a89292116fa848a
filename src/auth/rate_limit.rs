use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::error::ApiError;

/// Fixed-window rate limiter backed by the `rate_limits` table.
///
/// Increments a counter keyed on `rate:{prefix}:{identifier}`; the counter
/// resets once its window is older than `window_secs`. Returns
/// `Err(ApiError::TooManyRequests)` when the counter exceeds `max_attempts`.
pub async fn check_rate(
    pool: &SqlitePool,
    prefix: &str,
    identifier: &str,
    max_attempts: i64,
    window_secs: i64,
) -> Result<(), ApiError> {
    let key = format!("rate:{prefix}:{identifier}");
    let now = Utc::now();
    let cutoff = now - Duration::seconds(window_secs);

    let count: i64 = sqlx::query_scalar(
        "INSERT INTO rate_limits (key, count, window_started_at) VALUES (?1, 1, ?2)
         ON CONFLICT(key) DO UPDATE SET
             count = CASE WHEN rate_limits.window_started_at > ?3
                          THEN rate_limits.count + 1 ELSE 1 END,
             window_started_at = CASE WHEN rate_limits.window_started_at > ?3
                                 THEN rate_limits.window_started_at ELSE excluded.window_started_at END
         RETURNING count",
    )
    .bind(&key)
    .bind(now)
    .bind(cutoff)
    .fetch_one(pool)
    .await?;

    if count > max_attempts {
        return Err(ApiError::TooManyRequests);
    }

    Ok(())
}
