use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use painterp_auth::JwtValidator;

use crate::app::errors::{ApiError, ErrorDetail};
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        ApiError::Unauthorized("Not authorized, token failed")
    })?;

    req.extensions_mut()
        .insert(PrincipalContext::from_claims(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    const NO_TOKEN: ApiError = ApiError::Unauthorized("Not authorized, no token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(NO_TOKEN)?;

    let header = header.to_str().map_err(|_| NO_TOKEN)?;

    let header = header.strip_prefix("Bearer ").ok_or(NO_TOKEN)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(NO_TOKEN);
    }

    Ok(token)
}

/// One log line per request with method, path, status and latency.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), latency_ms, "request failed");
    } else {
        info!(%method, %path, status = status.as_u16(), latency_ms, "request handled");
    }
    response
}

/// Re-render 5xx envelopes with the underlying cause under `error`.
///
/// Only installed outside production.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail { message, detail }) = response.extensions().get::<ErrorDetail>().cloned()
    else {
        return response;
    };

    (
        response.status(),
        Json(json!({
            "success": false,
            "message": message,
            "error": detail,
        })),
    )
        .into_response()
}
