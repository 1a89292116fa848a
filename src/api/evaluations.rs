use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

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

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub intern_id: i64,
    pub project_id: i64,
    pub stars: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalEvaluationRequest {
    pub intern_id: i64,
    pub project_id: i64,
    pub evaluator_remark: Option<String>,
    pub criteria: Option<serde_json::Value>,
    pub signature: Option<String>,
    pub stars: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub intern_id: i64,
    /// Omitted means lock; `false` unlocks again.
    pub lock: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VerdictRequest {
    pub intern_id: i64,
    pub verdict: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectSignatureRequest {
    pub intern_id: i64,
    pub evaluation_id: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    pub intern_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub verdict: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct EvaluationResponse {
    pub id: i64,
    pub evaluator_id: i64,
    pub intern_id: i64,
    pub project_id: i64,
    pub stars: Option<i64>,
    pub comment: Option<String>,
    pub is_final: bool,
    pub criteria: Option<sqlx::types::Json<serde_json::Value>>,
    pub signature: Option<String>,
    pub lock_status: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct VerdictResponse {
    pub id: i64,
    pub intern_id: i64,
    pub project_id: Option<i64>,
    pub verdict: String,
    pub remarks: Option<String>,
    pub decided_by_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LockResponse {
    pub intern_id: i64,
    pub lock_status: bool,
    pub updated_evaluations: u64,
}

#[derive(Debug, Serialize)]
pub struct VerdictSummaryResponse {
    pub intern_id: i64,
    pub total_evaluations: i64,
    pub average_stars: Option<f64>,
    pub is_locked: bool,
    pub last_comment: Option<String>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub verdict: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ArchiveEntry {
    pub id: i64,
    pub intern_id: i64,
    pub intern_name: String,
    pub evaluator_id: i64,
    pub evaluator_name: String,
    pub project_id: i64,
    pub project_name: String,
    pub stars: Option<i64>,
    pub comment: Option<String>,
    pub is_final: bool,
    pub lock_status: bool,
    pub verdict: Option<String>,
    pub created_at: DateTime<Utc>,
}

const EVALUATION_COLUMNS: &str = "id, evaluator_id, intern_id, project_id, stars, comment, \
     is_final, criteria, signature, lock_status, created_at";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/evaluation/evaluate", post(evaluate))
        .route("/evaluation/evaluations/{intern_id}", get(list_evaluations))
        .route("/evaluation/final", post(submit_final))
        .route("/evaluation/lock", post(lock_evaluations))
        .route("/evaluation/verdict", post(submit_verdict))
        .route("/evaluation/verdict-summary/{intern_id}", get(verdict_summary))
        .route("/evaluation/reject-signature", post(reject_signature))
        .route("/evaluation/archive", get(archive))
}

/// Quick evaluation: a star rating plus an optional comment. The stored
/// evaluator is always the authenticated caller, never a payload field.
#[tracing::instrument(
    skip(state, body),
    fields(user_id = auth.id, intern_id = body.intern_id, project_id = body.project_id)
)]
async fn evaluate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<EvaluateRequest>,
) -> Result<(StatusCode, Json<EvaluationResponse>), ApiError> {
    if !auth.role.can_evaluate() {
        return Err(ApiError::Forbidden);
    }
    validation::check_rating("stars", body.stars)?;

    let intern = helpers::require_user(&state.pool, body.intern_id, "Intern").await?;
    let project = helpers::require_project(&state.pool, body.project_id).await?;

    let evaluation = sqlx::query_as::<_, EvaluationResponse>(&format!(
        "INSERT INTO evaluations
             (evaluator_id, intern_id, project_id, stars, comment, is_final, lock_status, created_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?)
         RETURNING {EVALUATION_COLUMNS}"
    ))
    .bind(auth.id)
    .bind(intern.id)
    .bind(project.id)
    .bind(body.stars)
    .bind(&body.comment)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(evaluation)))
}

/// Evaluation history for one intern, newest first. Any authenticated user.
async fn list_evaluations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(intern_id): Path<i64>,
) -> Result<Json<Vec<EvaluationResponse>>, ApiError> {
    let evaluations = sqlx::query_as::<_, EvaluationResponse>(&format!(
        "SELECT {EVALUATION_COLUMNS} FROM evaluations
         WHERE intern_id = ?
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(intern_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(evaluations))
}

/// Final evaluation with a criteria map and an optional signature payload.
/// A present signature is hashed (SHA-256) and recorded as a verification
/// row; no expected hash is provisioned, so the row starts out valid.
#[tracing::instrument(
    skip(state, body),
    fields(user_id = auth.id, intern_id = body.intern_id, project_id = body.project_id)
)]
async fn submit_final(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FinalEvaluationRequest>,
) -> Result<(StatusCode, Json<EvaluationResponse>), ApiError> {
    if !auth.role.can_evaluate() {
        return Err(ApiError::Forbidden);
    }
    if let Some(stars) = body.stars {
        validation::check_rating("stars", stars)?;
    }

    let intern = helpers::require_user(&state.pool, body.intern_id, "Intern").await?;
    let project = helpers::require_project(&state.pool, body.project_id).await?;
    let criteria = body.criteria.unwrap_or_else(|| serde_json::json!({}));

    let mut tx = state.pool.begin().await?;

    let evaluation = sqlx::query_as::<_, EvaluationResponse>(&format!(
        "INSERT INTO evaluations
             (evaluator_id, intern_id, project_id, stars, comment, is_final, criteria,
              signature, lock_status, created_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?, 0, ?)
         RETURNING {EVALUATION_COLUMNS}"
    ))
    .bind(auth.id)
    .bind(intern.id)
    .bind(project.id)
    .bind(body.stars)
    .bind(&body.evaluator_remark)
    .bind(sqlx::types::Json(&criteria))
    .bind(&body.signature)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    let signature_hash = body.signature.as_deref().map(signature_digest);
    if let Some(hash) = &signature_hash {
        sqlx::query(
            "INSERT INTO signature_verifications
                 (evaluation_id, intern_id, project_id, signature_hash, is_valid, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(evaluation.id)
        .bind(intern.id)
        .bind(project.id)
        .bind(hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let mut meta = serde_json::json!({
        "intern_id": intern.id,
        "project_id": project.id,
    });
    if let Some(hash) = &signature_hash {
        meta["signature_hash"] = serde_json::json!(hash);
        meta["signature_valid"] = serde_json::json!(true);
    }
    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "evaluation_final",
            message: "Final evaluation submitted",
            meta: Some(meta),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(evaluation)))
}

/// Set or clear lock_status on every evaluation row the intern has, in one
/// statement. Locking is the gate the verdict flow checks.
#[tracing::instrument(skip(state, body), fields(user_id = auth.id, intern_id = body.intern_id))]
async fn lock_evaluations(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    if !auth.role.can_evaluate() {
        return Err(ApiError::Forbidden);
    }
    let lock = body.lock.unwrap_or(true);

    let intern = helpers::require_user(&state.pool, body.intern_id, "Intern").await?;

    let mut tx = state.pool.begin().await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM evaluations WHERE intern_id = ?")
        .bind(intern.id)
        .fetch_one(&mut *tx)
        .await?;
    if total == 0 {
        return Err(ApiError::BadRequest("Intern has no evaluations to lock".into()));
    }
    let updated = sqlx::query("UPDATE evaluations SET lock_status = ? WHERE intern_id = ?")
        .bind(lock)
        .bind(intern.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "evaluation_lock",
            message: "Evaluation lock updated",
            meta: Some(serde_json::json!({
                "intern_id": intern.id,
                "lock_status": lock,
                "updated_evaluations": updated,
            })),
        },
    )
    .await;

    Ok(Json(LockResponse {
        intern_id: intern.id,
        lock_status: lock,
        updated_evaluations: updated,
    }))
}

/// Record the final verdict for an intern. Requires a locked evaluation;
/// the most recent locked row supplies the project reference.
#[tracing::instrument(skip(state, body), fields(user_id = auth.id, intern_id = body.intern_id))]
async fn submit_verdict(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<VerdictRequest>,
) -> Result<(StatusCode, Json<VerdictResponse>), ApiError> {
    if !auth.role.can_evaluate() {
        return Err(ApiError::Forbidden);
    }
    validation::check_length("verdict", &body.verdict, 1, 100)?;

    let intern = helpers::require_user(&state.pool, body.intern_id, "Intern").await?;

    let locked_project: Option<i64> = sqlx::query_scalar(
        "SELECT project_id FROM evaluations
         WHERE intern_id = ? AND lock_status = 1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(intern.id)
    .fetch_optional(&state.pool)
    .await?;
    let Some(project_id) = locked_project else {
        return Err(ApiError::BadRequest(
            "Intern has no locked evaluations; lock them before a verdict".into(),
        ));
    };

    let verdict = sqlx::query_as::<_, VerdictResponse>(
        "INSERT INTO verdicts (intern_id, project_id, verdict, remarks, decided_by_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id, intern_id, project_id, verdict, remarks, decided_by_id, created_at",
    )
    .bind(intern.id)
    .bind(project_id)
    .bind(&body.verdict)
    .bind(&body.remarks)
    .bind(auth.id)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await?;

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "evaluation_verdict",
            message: "Verdict submitted",
            meta: Some(serde_json::json!({
                "intern_id": intern.id,
                "project_id": project_id,
                "verdict": verdict.verdict,
            })),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(verdict)))
}

/// Aggregate view of an intern's evaluations plus the latest verdict.
async fn verdict_summary(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(intern_id): Path<i64>,
) -> Result<Json<VerdictSummaryResponse>, ApiError> {
    let intern = helpers::require_user(&state.pool, intern_id, "Intern").await?;

    let (total, average, locked): (i64, Option<f64>, i64) = sqlx::query_as(
        "SELECT COUNT(*), AVG(stars), COALESCE(MAX(lock_status), 0)
         FROM evaluations WHERE intern_id = ?",
    )
    .bind(intern.id)
    .fetch_one(&state.pool)
    .await?;

    let latest: Option<(Option<String>, DateTime<Utc>)> = sqlx::query_as(
        "SELECT comment, created_at FROM evaluations
         WHERE intern_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(intern.id)
    .fetch_optional(&state.pool)
    .await?;

    let verdict: Option<String> = sqlx::query_scalar(
        "SELECT verdict FROM verdicts
         WHERE intern_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(intern.id)
    .fetch_optional(&state.pool)
    .await?;

    let (last_comment, last_evaluated_at) = match latest {
        Some((comment, at)) => (comment, Some(at)),
        None => (None, None),
    };

    Ok(Json(VerdictSummaryResponse {
        intern_id: intern.id,
        total_evaluations: total,
        average_stars: average.map(round2),
        is_locked: locked != 0,
        last_comment,
        last_evaluated_at,
        verdict,
    }))
}

/// Invalidate a submitted signature. The signature itself is cleared, the
/// verification row flips to invalid, and the intern is notified.
#[tracing::instrument(
    skip(state, body),
    fields(user_id = auth.id, evaluation_id = body.evaluation_id)
)]
async fn reject_signature(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RejectSignatureRequest>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    auth.require(&[Role::Admin])?;

    let target: Option<(i64, Option<String>)> =
        sqlx::query_as("SELECT intern_id, signature FROM evaluations WHERE id = ?")
            .bind(body.evaluation_id)
            .fetch_optional(&state.pool)
            .await?;
    let Some((intern_id, signature)) = target else {
        return Err(ApiError::NotFound("Evaluation not found".into()));
    };
    if intern_id != body.intern_id {
        return Err(ApiError::BadRequest(
            "Evaluation does not belong to this intern".into(),
        ));
    }
    if signature.is_none() {
        return Err(ApiError::BadRequest(
            "Evaluation has no signature to reject".into(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    let evaluation = sqlx::query_as::<_, EvaluationResponse>(&format!(
        "UPDATE evaluations SET signature = NULL WHERE id = ? RETURNING {EVALUATION_COLUMNS}"
    ))
    .bind(body.evaluation_id)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE signature_verifications SET is_valid = 0 WHERE evaluation_id = ?")
        .bind(body.evaluation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "signature_rejected",
            message: "Evaluation signature rejected",
            meta: Some(serde_json::json!({
                "evaluation_id": body.evaluation_id,
                "intern_id": intern_id,
                "reason": body.reason,
            })),
        },
    )
    .await;

    dispatch::on_signature_rejected(&state, intern_id, body.reason.as_deref()).await;

    Ok(Json(evaluation))
}

/// Historical archive joined with people and project names. The verdict
/// column is the intern's latest verdict row.
async fn archive(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ArchiveParams>,
) -> Result<Json<Vec<ArchiveEntry>>, ApiError> {
    auth.require(&[Role::Admin, Role::Manager, Role::Hr, Role::Pm])?;

    let from_bound = params.from.map(|d| d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()));
    let to_bound = params
        .to
        .and_then(|d| d.succ_opt())
        .map(|d| d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()));
    let (from_bound, to_bound) = (from_bound.flatten(), to_bound.flatten());

    let entries = sqlx::query_as::<_, ArchiveEntry>(
        "SELECT * FROM (
             SELECT e.id, e.intern_id, i.full_name AS intern_name,
                    e.evaluator_id, ev.full_name AS evaluator_name,
                    e.project_id, p.name AS project_name,
                    e.stars, e.comment, e.is_final, e.lock_status,
                    (SELECT v.verdict FROM verdicts v
                     WHERE v.intern_id = e.intern_id
                     ORDER BY v.created_at DESC, v.id DESC
                     LIMIT 1) AS verdict,
                    e.created_at
             FROM evaluations e
             JOIN users i ON i.id = e.intern_id
             JOIN users ev ON ev.id = e.evaluator_id
             JOIN projects p ON p.id = e.project_id
             WHERE (?1 IS NULL OR e.intern_id = ?1)
               AND (?2 IS NULL OR e.created_at >= ?2)
               AND (?3 IS NULL OR e.created_at < ?3)
         )
         WHERE (?4 IS NULL OR verdict = ?4)
         ORDER BY created_at DESC, id DESC",
    )
    .bind(params.intern_id)
    .bind(from_bound)
    .bind(to_bound)
    .bind(&params.verdict)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(entries))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn signature_digest(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
