use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

/// Upper bound for one upload request (both ledgers together).
pub const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Create the main application router with all API endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Query
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/reload", post(handlers::reload))
        // Upload and regenerate
        .route(
            "/api/upload_ledgers",
            post(handlers::upload_ledgers).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
