use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that require no credentials.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
}
