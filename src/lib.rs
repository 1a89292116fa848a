pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod store;
pub mod sync;
pub mod validation;
