use crate::auth::rate_limit;
use crate::error::ApiError;
use crate::store::AppState;

pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: String,
}

/// Central in-app notification write. Rate-limited per recipient so a
/// runaway caller cannot flood a single inbox.
#[tracing::instrument(
    skip(state, notification),
    fields(
        user_id = notification.user_id,
        notification_type = %notification.notification_type
    ),
    err
)]
pub async fn notify(state: &AppState, notification: NewNotification) -> Result<i64, ApiError> {
    let user_key = notification.user_id.to_string();
    rate_limit::check_rate(&state.pool, "notify", &user_key, 100, 3600).await?;

    let id = sqlx::query_scalar(
        "INSERT INTO notifications (user_id, title, message, notification_type, is_read, created_at)
         VALUES (?, ?, ?, ?, 0, ?)
         RETURNING id",
    )
    .bind(notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.notification_type)
    .bind(chrono::Utc::now())
    .fetch_one(&state.pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Event-driven helpers (callable by other modules)
// ---------------------------------------------------------------------------

/// Tell an intern they were assigned to a project.
pub async fn on_project_assigned(state: &AppState, intern_id: i64, project_name: &str) {
    let message = format!("You have been assigned to project {project_name}.");
    let _ = notify(
        state,
        NewNotification {
            user_id: intern_id,
            title: "New project assignment".into(),
            message: message.clone(),
            notification_type: "assignment".into(),
        },
    )
    .await;
    push_to_user(state, intern_id, "New project assignment", &message).await;
}

/// Tell an intern that new feedback landed on one of their projects.
pub async fn on_feedback_submitted(state: &AppState, intern_id: i64, project_name: &str, rating: i64) {
    let message =
        format!("You received new feedback on project {project_name} with rating {rating}/5.");
    let _ = notify(
        state,
        NewNotification {
            user_id: intern_id,
            title: "New feedback received".into(),
            message: message.clone(),
            notification_type: "feedback".into(),
        },
    )
    .await;
    push_to_user(state, intern_id, "New feedback received", &message).await;
}

/// Tell an intern their evaluation signature was rejected.
pub async fn on_signature_rejected(state: &AppState, intern_id: i64, reason: Option<&str>) {
    let message = match reason {
        Some(r) => format!("Your evaluation signature was rejected: {r}"),
        None => "Your evaluation signature was rejected. Please sign again.".into(),
    };
    let _ = notify(
        state,
        NewNotification {
            user_id: intern_id,
            title: "Signature rejected".into(),
            message: message.clone(),
            notification_type: "signature".into(),
        },
    )
    .await;
    push_to_user(state, intern_id, "Signature rejected", &message).await;
}

async fn push_to_user(state: &AppState, user_id: i64, title: &str, body: &str) {
    let token = sqlx::query_scalar::<_, Option<String>>("SELECT fcm_token FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
        .ok()
        .flatten()
        .flatten();

    if let Some(token) = token {
        crate::notify::push::send(&state.config, &token, title, body).await;
    }
}
