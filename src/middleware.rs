use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::store::AppState;

/// Paths reachable without an API key: health probe, the banner, login
/// and self-registration.
const PUBLIC_PATHS: &[&str] = &["/", "/healthz", "/login", "/user/register"];

/// Hardening headers applied to every response.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    resp
}

/// Optional shared-key gate for anonymous machine traffic. Bearer-carrying
/// requests pass through; they are authenticated downstream.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.api_key_enabled {
        return Ok(next.run(req).await);
    }
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }
    if let Some(auth) = req.headers().get(header::AUTHORIZATION)
        && auth.to_str().is_ok_and(|v| v.starts_with("Bearer "))
    {
        return Ok(next.run(req).await);
    }

    let presented = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    match (state.config.api_key.as_deref(), presented) {
        (Some(expected), Some(given)) if expected == given => Ok(next.run(req).await),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Reject requests whose Host header is not in the configured allow-list.
/// An empty list or a `*` entry disables the check.
pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let allowed = &state.config.trusted_hosts;
    if allowed.is_empty() || allowed.iter().any(|h| h == "*") {
        return Ok(next.run(req).await);
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_owned());
    match host {
        Some(h) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&h)) => Ok(next.run(req).await),
        _ => Err(ApiError::BadRequest("invalid host header".into())),
    }
}
