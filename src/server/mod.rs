//! HTTP surface.
//!
//! Routes:
//! - `GET /` → plain greeting
//! - `GET /health` → `{"alive": true}`
//! - `POST /run` with `{"code": "..."}` → captured program output
//! - `GET /data/{category}/{id}/` → static lesson content

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::executor::Executor;

pub mod error;
pub mod handlers;
mod routes;

pub use error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Sandboxed executor for `/run`
    pub executor: Arc<Executor>,
    /// Root of the `/data` lookup
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(executor: Arc<Executor>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            static_dir: static_dir.into(),
        }
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let allowed_headers: [HeaderName; 1] = [header::CONTENT_TYPE];
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(allowed_headers)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]);

    Router::new()
        .merge(routes::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `addr` until the process is stopped.
///
/// # Errors
///
/// Returns error if the listener cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    info!("Starting sandpit on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining in-flight requests"),
        Err(e) => {
            warn!("Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
