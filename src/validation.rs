use chrono::NaiveDate;

use crate::error::ApiError;

/// Lifecycle states shared by tasks and leave requests.
pub const TASK_STATUSES: &[&str] = &["pending", "approved", "rejected"];
pub const LEAVE_STATUSES: &[&str] = &["pending", "approved", "rejected"];

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.len();
    if len < min || len > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

pub fn check_email(value: &str) -> Result<(), ApiError> {
    check_length("email", value, 3, 254)?;
    if !value.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".into()));
    }
    Ok(())
}

/// Star/rating scale used by evaluations and feedback.
pub fn check_rating(field: &str, value: i64) -> Result<(), ApiError> {
    if !(1..=5).contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between 1 and 5 (got {value})"
        )));
    }
    Ok(())
}

pub fn check_progress(value: i64) -> Result<(), ApiError> {
    if !(0..=100).contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "progress must be between 0 and 100 (got {value})"
        )));
    }
    Ok(())
}

pub fn check_status(field: &str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if !allowed.contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "{field} must be one of {allowed:?} (got {value})"
        )));
    }
    Ok(())
}

pub fn check_date_order(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if end < start {
        return Err(ApiError::BadRequest(
            "end_date must not be before start_date".into(),
        ));
    }
    Ok(())
}
