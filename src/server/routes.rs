use axum::{
    Router,
    routing::{get, post},
};

use super::AppState;
use super::handlers;

/// Create service routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        // Health check
        .route("/health", get(handlers::health))
        // Code execution
        .route("/run", post(handlers::run))
        // Static lesson content
        .route("/data/{category}/{id}/", get(handlers::data))
}
