pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod departments;
pub mod evaluations;
pub mod export;
pub mod feedback;
mod helpers;
pub mod leaves;
pub mod notifications;
pub mod projects;
pub mod reports;
pub mod roles;
pub mod sync;
pub mod tasks;
pub mod users;

use axum::Router;

use crate::store::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(roles::router())
        .merge(projects::router())
        .merge(tasks::router())
        .merge(leaves::router())
        .merge(evaluations::router())
        .merge(feedback::router())
        .merge(notifications::router())
        .merge(departments::router())
        .merge(dashboard::router())
        .merge(reports::router())
        .merge(export::router())
        .merge(admin::router())
        .merge(sync::router())
}
