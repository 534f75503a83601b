use axum::Router;

pub mod billing;
pub mod inventory;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/inventory", inventory::router())
        .nest("/billing", billing::router())
}
