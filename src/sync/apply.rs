use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::auth::middleware::AuthUser;
use crate::sync::QueueItem;
use crate::validation;

/// Apply one queued mutation to its target table.
///
/// Role and ownership rules mirror the online endpoints: the queue is a
/// delivery mechanism, not a privilege escalation path. Errors become the
/// item's `error_message`; they never abort the surrounding batch.
pub async fn dispatch(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    item: &QueueItem,
) -> anyhow::Result<Option<i64>> {
    match item.table_name.as_str() {
        "evaluations" => match item.operation_type.as_str() {
            "create" => create_evaluation(conn, user, &item.data).await,
            "update" => update_evaluation(conn, user, item.record_id, &item.data).await,
            "delete" => delete_evaluation(conn, user, item.record_id).await,
            op => anyhow::bail!("unsupported operation: {op}"),
        },
        "tasks" => match item.operation_type.as_str() {
            "create" => create_task(conn, user, &item.data).await,
            "update" => update_task(conn, user, item.record_id, &item.data).await,
            "delete" => delete_task(conn, user, item.record_id).await,
            op => anyhow::bail!("unsupported operation: {op}"),
        },
        "feedbacks" => match item.operation_type.as_str() {
            "create" => create_feedback(conn, user, &item.data).await,
            "update" => update_feedback(conn, user, item.record_id, &item.data).await,
            "delete" => delete_feedback(conn, user, item.record_id).await,
            op => anyhow::bail!("unsupported operation: {op}"),
        },
        "leaves" => match item.operation_type.as_str() {
            "create" => create_leave(conn, user, &item.data).await,
            "update" => update_leave(conn, user, item.record_id, &item.data).await,
            "delete" => delete_leave(conn, user, item.record_id).await,
            op => anyhow::bail!("unsupported operation: {op}"),
        },
        "attendance" => match item.operation_type.as_str() {
            "create" => create_attendance(conn, user, &item.data).await,
            "update" => update_attendance(conn, user, item.record_id, &item.data).await,
            "delete" => delete_attendance(conn, user, item.record_id).await,
            op => anyhow::bail!("unsupported operation: {op}"),
        },
        other => anyhow::bail!("unsupported table: {other}"),
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: &serde_json::Value) -> anyhow::Result<T> {
    serde_json::from_value(data.clone()).map_err(|e| anyhow::anyhow!("malformed payload: {e}"))
}

fn require_record_id(record_id: Option<i64>) -> anyhow::Result<i64> {
    record_id.ok_or_else(|| anyhow::anyhow!("record_id is required for update/delete"))
}

// ---------------------------------------------------------------------------
// Evaluations
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct EvaluationCreate {
    intern_id: i64,
    project_id: i64,
    stars: Option<i64>,
    comment: Option<String>,
}

#[derive(serde::Deserialize)]
struct EvaluationPatch {
    stars: Option<i64>,
    comment: Option<String>,
}

async fn create_evaluation(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    if !user.role.can_evaluate() {
        anyhow::bail!("role {} may not create evaluations", user.role);
    }
    let payload: EvaluationCreate = parse(data)?;
    if let Some(stars) = payload.stars {
        validation::check_rating("stars", stars)?;
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO evaluations
             (evaluator_id, intern_id, project_id, stars, comment, is_final, lock_status, created_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?)
         RETURNING id",
    )
    .bind(user.id)
    .bind(payload.intern_id)
    .bind(payload.project_id)
    .bind(payload.stars)
    .bind(&payload.comment)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(id))
}

async fn update_evaluation(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    let payload: EvaluationPatch = parse(data)?;
    if let Some(stars) = payload.stars {
        validation::check_rating("stars", stars)?;
    }

    let row: Option<(i64, bool)> =
        sqlx::query_as("SELECT evaluator_id, lock_status FROM evaluations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some((evaluator_id, locked)) = row else {
        anyhow::bail!("evaluation {id} not found");
    };
    if evaluator_id != user.id && !user.role.is_admin() {
        anyhow::bail!("not allowed to modify evaluation {id}");
    }
    if locked {
        anyhow::bail!("evaluation {id} is locked");
    }

    sqlx::query(
        "UPDATE evaluations SET stars = COALESCE(?, stars), comment = COALESCE(?, comment)
         WHERE id = ?",
    )
    .bind(payload.stars)
    .bind(&payload.comment)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(None)
}

async fn delete_evaluation(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;

    let row: Option<(i64, bool)> =
        sqlx::query_as("SELECT evaluator_id, lock_status FROM evaluations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some((evaluator_id, locked)) = row else {
        anyhow::bail!("evaluation {id} not found");
    };
    if evaluator_id != user.id && !user.role.is_admin() {
        anyhow::bail!("not allowed to delete evaluation {id}");
    }
    if locked {
        anyhow::bail!("evaluation {id} is locked");
    }

    sqlx::query("DELETE FROM signature_verifications WHERE evaluation_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM evaluations WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct TaskCreate {
    project_id: Option<i64>,
    title: String,
    description: Option<String>,
    status: Option<String>,
    progress: Option<i64>,
    assigned_to_id: i64,
    due_date: Option<NaiveDate>,
}

#[derive(serde::Deserialize)]
struct TaskPatch {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    progress: Option<i64>,
}

async fn create_task(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    if !user.role.can_manage_tasks() {
        anyhow::bail!("role {} may not create tasks", user.role);
    }
    let payload: TaskCreate = parse(data)?;
    let status = payload.status.as_deref().unwrap_or("pending");
    validation::check_status("status", status, validation::TASK_STATUSES)?;
    let progress = payload.progress.unwrap_or(0);
    validation::check_progress(progress)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO tasks
             (project_id, title, description, status, progress, assigned_to_id, assigned_by_id,
              due_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(payload.project_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(status)
    .bind(progress)
    .bind(payload.assigned_to_id)
    .bind(user.id)
    .bind(payload.due_date)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(id))
}

async fn check_task_ownership(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    id: i64,
) -> anyhow::Result<()> {
    let assigned_to: Option<i64> = sqlx::query_scalar("SELECT assigned_to_id FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(assigned_to) = assigned_to else {
        anyhow::bail!("task {id} not found");
    };
    if assigned_to != user.id && !user.role.can_manage_tasks() {
        anyhow::bail!("not allowed to modify task {id}");
    }
    Ok(())
}

async fn update_task(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    let payload: TaskPatch = parse(data)?;
    if let Some(status) = payload.status.as_deref() {
        validation::check_status("status", status, validation::TASK_STATUSES)?;
    }
    if let Some(progress) = payload.progress {
        validation::check_progress(progress)?;
    }
    check_task_ownership(conn, user, id).await?;

    sqlx::query(
        "UPDATE tasks SET
             title = COALESCE(?, title),
             description = COALESCE(?, description),
             status = COALESCE(?, status),
             progress = COALESCE(?, progress),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.status)
    .bind(payload.progress)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(None)
}

async fn delete_task(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    check_task_ownership(conn, user, id).await?;

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Feedbacks
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct FeedbackCreate {
    intern_id: i64,
    project_id: i64,
    feedback_text: String,
    rating: i64,
}

#[derive(serde::Deserialize)]
struct FeedbackPatch {
    feedback_text: Option<String>,
    rating: Option<i64>,
}

async fn create_feedback(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    if !user.role.can_evaluate() {
        anyhow::bail!("role {} may not submit feedback", user.role);
    }
    let payload: FeedbackCreate = parse(data)?;
    validation::check_rating("rating", payload.rating)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO feedbacks (pm_id, intern_id, project_id, feedback_text, rating, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user.id)
    .bind(payload.intern_id)
    .bind(payload.project_id)
    .bind(&payload.feedback_text)
    .bind(payload.rating)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(id))
}

async fn check_feedback_ownership(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    id: i64,
) -> anyhow::Result<()> {
    let pm_id: Option<i64> = sqlx::query_scalar("SELECT pm_id FROM feedbacks WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(pm_id) = pm_id else {
        anyhow::bail!("feedback {id} not found");
    };
    if pm_id != user.id && !user.role.is_admin() {
        anyhow::bail!("not allowed to modify feedback {id}");
    }
    Ok(())
}

async fn update_feedback(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    let payload: FeedbackPatch = parse(data)?;
    if let Some(rating) = payload.rating {
        validation::check_rating("rating", rating)?;
    }
    check_feedback_ownership(conn, user, id).await?;

    sqlx::query(
        "UPDATE feedbacks SET
             feedback_text = COALESCE(?, feedback_text),
             rating = COALESCE(?, rating)
         WHERE id = ?",
    )
    .bind(&payload.feedback_text)
    .bind(payload.rating)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(None)
}

async fn delete_feedback(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    check_feedback_ownership(conn, user, id).await?;

    sqlx::query("DELETE FROM feedbacks WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct LeaveCreate {
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct LeavePatch {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    reason: Option<String>,
}

async fn create_leave(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let payload: LeaveCreate = parse(data)?;
    validation::check_date_order(payload.start_date, payload.end_date)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO leaves (user_id, start_date, end_date, reason, status, created_at)
         VALUES (?, ?, ?, ?, 'pending', ?)
         RETURNING id",
    )
    .bind(user.id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&payload.reason)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(id))
}

async fn update_leave(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    let payload: LeavePatch = parse(data)?;

    let row: Option<(i64, NaiveDate, NaiveDate)> =
        sqlx::query_as("SELECT user_id, start_date, end_date FROM leaves WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some((owner_id, start, end)) = row else {
        anyhow::bail!("leave {id} not found");
    };
    if owner_id != user.id {
        anyhow::bail!("not allowed to modify leave {id}");
    }

    let new_start = payload.start_date.unwrap_or(start);
    let new_end = payload.end_date.unwrap_or(end);
    validation::check_date_order(new_start, new_end)?;

    sqlx::query(
        "UPDATE leaves SET start_date = ?, end_date = ?, reason = COALESCE(?, reason),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(new_start)
    .bind(new_end)
    .bind(&payload.reason)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(None)
}

async fn delete_leave(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;

    let owner_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM leaves WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(owner_id) = owner_id else {
        anyhow::bail!("leave {id} not found");
    };
    if owner_id != user.id {
        anyhow::bail!("not allowed to delete leave {id}");
    }

    sqlx::query("DELETE FROM leaves WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct AttendanceCreate {
    date: NaiveDate,
    present: Option<bool>,
}

#[derive(serde::Deserialize)]
struct AttendancePatch {
    date: Option<NaiveDate>,
    present: Option<bool>,
}

async fn create_attendance(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let payload: AttendanceCreate = parse(data)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO attendance (user_id, date, present, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user.id)
    .bind(payload.date)
    .bind(payload.present.unwrap_or(true))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Some(id))
}

async fn update_attendance(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
    data: &serde_json::Value,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;
    let payload: AttendancePatch = parse(data)?;

    let owner_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM attendance WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(owner_id) = owner_id else {
        anyhow::bail!("attendance {id} not found");
    };
    if owner_id != user.id {
        anyhow::bail!("not allowed to modify attendance {id}");
    }

    sqlx::query(
        "UPDATE attendance SET date = COALESCE(?, date), present = COALESCE(?, present)
         WHERE id = ?",
    )
    .bind(payload.date)
    .bind(payload.present)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(None)
}

async fn delete_attendance(
    conn: &mut SqliteConnection,
    user: &AuthUser,
    record_id: Option<i64>,
) -> anyhow::Result<Option<i64>> {
    let id = require_record_id(record_id)?;

    let owner_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM attendance WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(owner_id) = owner_id else {
        anyhow::bail!("attendance {id} not found");
    };
    if owner_id != user.id {
        anyhow::bail!("not allowed to delete attendance {id}");
    }

    sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(None)
}
