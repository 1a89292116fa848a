use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::helpers;
use crate::audit::{self, AuditEntry};
use crate::auth::middleware::AuthUser;
use crate::auth::role::Role;
use crate::error::ApiError;
use crate::notify::dispatch;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FeedbackResponse {
    pub id: i64,
    pub project_id: i64,
    pub intern_id: i64,
    pub pm_id: i64,
    pub feedback_text: String,
    pub rating: i64,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

const FEEDBACK_COLUMNS: &str =
    "id, project_id, intern_id, pm_id, feedback_text, rating, file_path, created_at, updated_at";

const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".txt", ".jpg", ".jpeg", ".png"];

/// Fields collected out of the multipart form before validation.
#[derive(Debug, Default)]
struct SubmitForm {
    project_id: Option<i64>,
    intern_id: Option<i64>,
    pm_id: Option<i64>,
    feedback_text: Option<String>,
    rating: Option<i64>,
    file: Option<(String, Vec<u8>)>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feedback/submit_feedback", post(submit_feedback))
        .route("/feedback/history/{intern_id}", get(history))
}

/// Project feedback for an intern, optionally with an attached document.
/// The attachment lands under `<upload_dir>/feedback/`.
#[tracing::instrument(skip(state, multipart), fields(user_id = auth.id))]
async fn submit_feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FeedbackResponse>), ApiError> {
    auth.require(&[Role::Pm, Role::Manager, Role::Admin])?;

    let form = read_form(multipart).await?;
    let project_id = required(form.project_id, "project_id")?;
    let intern_id = required(form.intern_id, "intern_id")?;
    let pm_id = required(form.pm_id, "pm_id")?;
    let feedback_text = required(form.feedback_text, "feedback_text")?;
    let rating = required(form.rating, "rating")?;

    validation::check_rating("rating", rating)?;
    validation::check_length("feedback_text", &feedback_text, 1, 5000)?;

    let pm = helpers::require_user(&state.pool, pm_id, "PM").await?;
    if !matches!(pm.role_name.parse::<Role>(), Ok(Role::Pm)) {
        return Err(ApiError::BadRequest("Specified user is not a PM".into()));
    }
    let project = helpers::require_project(&state.pool, project_id).await?;

    let assigned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM project_assignments WHERE intern_id = ? AND project_id = ?",
    )
    .bind(intern_id)
    .bind(project_id)
    .fetch_one(&state.pool)
    .await?;
    if assigned == 0 {
        return Err(ApiError::BadRequest(
            "Intern is not assigned to this project".into(),
        ));
    }

    let mut file_path: Option<String> = None;
    if let Some((original_name, data)) = &form.file {
        let stored = store_attachment(&state, project_id, intern_id, original_name, data).await?;
        file_path = Some(stored);
    }

    let feedback = sqlx::query_as::<_, FeedbackResponse>(&format!(
        "INSERT INTO feedbacks
             (project_id, intern_id, pm_id, feedback_text, rating, file_path, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING {FEEDBACK_COLUMNS}"
    ))
    .bind(project_id)
    .bind(intern_id)
    .bind(pm_id)
    .bind(&feedback_text)
    .bind(rating)
    .bind(&file_path)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    dispatch::on_feedback_submitted(&state, intern_id, &project.name, rating).await;

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "feedback",
            message: "Feedback submitted",
            meta: Some(serde_json::json!({
                "project_id": project_id,
                "intern_id": intern_id,
                "pm_id": pm_id,
                "rating": rating,
            })),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Feedback history for one intern, newest first.
async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(intern_id): Path<i64>,
) -> Result<Json<Vec<FeedbackResponse>>, ApiError> {
    auth.require(&[Role::Pm, Role::Manager, Role::Admin])?;

    let rows = sqlx::query_as::<_, FeedbackResponse>(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedbacks
         WHERE intern_id = ?
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(intern_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

async fn read_form(mut multipart: Multipart) -> Result<SubmitForm, ApiError> {
    let mut form = SubmitForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            "project_id" => form.project_id = Some(int_field(&name, field).await?),
            "intern_id" => form.intern_id = Some(int_field(&name, field).await?),
            "pm_id" => form.pm_id = Some(int_field(&name, field).await?),
            "rating" => form.rating = Some(int_field(&name, field).await?),
            "feedback_text" => form.feedback_text = Some(text_field(&name, field).await?),
            "file" => {
                let Some(file_name) = field.file_name().map(ToString::to_string) else {
                    continue;
                };
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read uploaded file: {e}"))
                })?;
                form.file = Some((file_name, data.to_vec()));
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn text_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read field {name}: {e}")))
}

async fn int_field(name: &str, field: axum::extract::multipart::Field<'_>) -> Result<i64, ApiError> {
    let text = text_field(name, field).await?;
    text.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{name} must be an integer")))
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("Missing form field: {name}")))
}

fn attachment_extension(original_name: &str) -> Result<String, ApiError> {
    let ext = FsPath::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()));
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(ApiError::BadRequest(
            "Invalid file type. Allowed: PDF, DOC, DOCX, TXT, JPG, PNG".into(),
        )),
    }
}

async fn store_attachment(
    state: &AppState,
    project_id: i64,
    intern_id: i64,
    original_name: &str,
    data: &[u8],
) -> Result<String, ApiError> {
    let ext = attachment_extension(original_name)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let file_name = format!("feedback_{project_id}_{intern_id}_{stamp}{ext}");

    let dir = state.config.upload_dir.join("feedback");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to create upload dir: {e}")))?;
    let path = dir.join(&file_name);
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to save uploaded file: {e}")))?;

    Ok(path.to_string_lossy().into_owned())
}
