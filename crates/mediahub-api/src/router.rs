//! Route definitions for the MediaHub HTTP layer.

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(storage_routes())
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Signed proxy for FTP/SFTP storages
fn storage_routes() -> Router<AppState> {
    Router::new().route("/storage/proxy/{*path}", get(handlers::proxy::proxy_file))
}
