use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, servers};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Servers
        .route(
            "/servers",
            get(servers::list_servers).post(servers::create_server),
        )
        .route(
            "/servers/{id}",
            get(servers::get_server).delete(servers::delete_server),
        )
        // Lifecycle
        .route("/servers/{id}/start", post(servers::start_server))
        .route("/servers/{id}/stop", post(servers::stop_server))
        .route("/servers/{id}/refresh", post(servers::refresh_server))
        // Files and access
        .route("/servers/{id}/files", get(servers::list_files))
        .route(
            "/servers/{id}/files/{file_type}",
            post(servers::upload_file).layer(DefaultBodyLimit::max(servers::MAX_UPLOAD_BYTES)),
        )
        .route("/servers/{id}/access", post(servers::validate_access))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
