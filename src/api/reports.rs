use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditEntry};
use crate::auth::middleware::AuthUser;
use crate::auth::role::Role;
use crate::error::ApiError;
use crate::store::AppState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    pub project_id: Option<i64>,
    pub evaluator_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct InternPerformance {
    pub intern_id: i64,
    pub intern_name: String,
    pub intern_email: String,
    pub average_rating: f64,
    pub total_feedbacks: i64,
    pub project_name: String,
    #[serde(skip)]
    project_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceReportResponse {
    pub project_id: i64,
    pub project_name: String,
    pub total_interns: i64,
    pub average_project_rating: f64,
    pub intern_performances: Vec<InternPerformance>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new().route("/report/generate_report", get(generate_report))
}

/// Per-intern average feedback rating grouped by project, with optional
/// project, evaluator, and date-range filters. The project-level average
/// weights each intern group by its feedback count.
#[tracing::instrument(skip(state), fields(user_id = auth.id))]
async fn generate_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ReportParams>,
) -> Result<Json<PerformanceReportResponse>, ApiError> {
    auth.require(&[Role::Admin, Role::Manager, Role::Hr, Role::Pm])?;

    let from_bound = params
        .start_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());
    let to_bound = params
        .end_date
        .and_then(|d| NaiveDate::succ_opt(&d))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    let groups = sqlx::query_as::<_, InternPerformance>(
        "SELECT f.intern_id, u.full_name AS intern_name, u.email AS intern_email,
                AVG(f.rating) AS average_rating, COUNT(f.id) AS total_feedbacks,
                p.name AS project_name, f.project_id
         FROM feedbacks f
         JOIN users u ON u.id = f.intern_id
         JOIN projects p ON p.id = f.project_id
         WHERE (?1 IS NULL OR f.project_id = ?1)
           AND (?2 IS NULL OR f.pm_id = ?2)
           AND (?3 IS NULL OR f.created_at >= ?3)
           AND (?4 IS NULL OR f.created_at < ?4)
         GROUP BY f.intern_id, f.project_id
         ORDER BY f.intern_id, f.project_id",
    )
    .bind(params.project_id)
    .bind(params.evaluator_id)
    .bind(from_bound)
    .bind(to_bound)
    .fetch_all(&state.pool)
    .await?;

    if groups.is_empty() {
        return Err(ApiError::NotFound(
            "No feedback data found for the specified criteria".into(),
        ));
    }

    let mut weighted_sum = 0.0;
    let mut total_feedbacks = 0_i64;
    for group in &groups {
        weighted_sum += group.average_rating * group.total_feedbacks as f64;
        total_feedbacks += group.total_feedbacks;
    }
    let average_project_rating = if total_feedbacks > 0 {
        round2(weighted_sum / total_feedbacks as f64)
    } else {
        0.0
    };

    let (report_project_id, report_project_name) = match params.project_id {
        Some(project_id) => {
            let name: Option<String> = sqlx::query_scalar("SELECT name FROM projects WHERE id = ?")
                .bind(project_id)
                .fetch_optional(&state.pool)
                .await?;
            match name {
                Some(name) => (project_id, name),
                None => return Err(ApiError::NotFound("Project not found".into())),
            }
        }
        None => (groups[0].project_id, groups[0].project_name.clone()),
    };

    audit::write_log(
        &state.pool,
        &AuditEntry {
            actor_user_id: auth.id,
            log_type: "report",
            message: "Performance report generated",
            meta: Some(serde_json::json!({
                "project_id": report_project_id,
                "project_name": report_project_name,
            })),
        },
    )
    .await;

    Ok(Json(PerformanceReportResponse {
        project_id: report_project_id,
        project_name: report_project_name,
        total_interns: groups.len() as i64,
        average_project_rating,
        intern_performances: groups,
        generated_at: Utc::now(),
    }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
