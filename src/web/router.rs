//! Router configuration for the HTTP endpoint.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{download, health_check, upload, AppState};

/// Create the router serving the Local bucket.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let file_routes = Router::new()
        .route("/file", get(download).put(upload))
        .layer(DefaultBodyLimit::disable())
        .with_state(app_state);

    Router::new()
        .merge(file_routes)
        .merge(create_health_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}
