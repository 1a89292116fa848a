use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod audit;
mod auth;
mod config;
mod error;
mod middleware;
mod notify;
mod store;
mod sync;
mod validation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("INTERNHUB_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = config::Config::load();

    // Connect to SQLite and run migrations
    let pool = store::pool::connect(&cfg.database_url).await?;

    // Seed roles and the admin account on first run
    store::bootstrap::run(&pool, cfg.admin_password.as_deref()).await?;

    let state = store::AppState {
        pool: pool.clone(),
        config: Arc::new(cfg.clone()),
    };

    let app = axum::Router::new()
        .route("/", axum::routing::get(root_banner))
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(api::router())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ))
        .layer(cors_layer(&cfg))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_trusted_hosts,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static("internhub"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(%addr, "starting internhub");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("internhub stopped");
    Ok(())
}

async fn root_banner() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "message": "InternHub backend is running"
    }))
}

/// Credentialed CORS needs explicit origins; with no configured origins the
/// layer falls back to a permissive non-credentialed policy for development.
fn cors_layer(cfg: &config::Config) -> CorsLayer {
    if cfg.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cfg
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
