//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and application services
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `extract.rs`: extractors that reject with the error envelope
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use painterp_auth::Hs256JwtValidator;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::AppServices::from_config(config).await?);
    Ok(build_router(config, services))
}

/// Router over already-built services.
pub fn build_router(config: &AppConfig, services: Arc<services::AppServices>) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .fallback(routes::system::not_found);

    let app = if config.environment.is_production() {
        app
    } else {
        app.layer(axum::middleware::from_fn(middleware::expose_error_details))
    };

    app.layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests)))
}
