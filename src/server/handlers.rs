use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::AppState;
use super::error::ApiError;
use crate::executor::ExecutionRequest;

/// Body of every successful JSON response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Result of `POST /run`
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    /// stderr if the program wrote any, otherwise stdout
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

pub async fn root() -> &'static str {
    "Hello!\n"
}

pub async fn health() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"alive": true}"#,
    )
}

/// Execute the submitted code in a sandbox.
///
/// The execution runs on its own task so a client hanging up cannot cancel
/// it halfway through cleanup.
pub async fn run(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    debug!("Received {} bytes of code", request.source.len());

    let executor = state.executor.clone();
    let result = tokio::spawn(async move { executor.run(&request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("execution task failed: {}", e)))?;

    match result {
        Ok(result) => {
            info!(
                "Run finished with exit code {} in {:?}",
                result.exit_code, result.duration
            );
            Ok(Json(RunResponse {
                message: result.message().to_string(),
                stdout: result.stdout,
                stderr: result.stderr,
                exit_code: result.exit_code,
            }))
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Serve `<static_dir>/<category>/<id>[.md|.py]` as a JSON message.
pub async fn data(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::NotFound(format!("no such item: {}", id)));
    }
    if category.is_empty()
        || !category
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(ApiError::NotFound(format!("no such category: {}", category)));
    }

    let mut file_name = if id.len() == 1 {
        format!("0{}", id)
    } else {
        id
    };
    match category.as_str() {
        "info" => file_name.push_str(".md"),
        "code" => file_name.push_str(".py"),
        _ => {}
    }

    let path = state.static_dir.join(&category).join(file_name);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Json(MessageResponse { message: text })),
        Err(e) => {
            info!("Error opening file: {}, error msg: {}", path.display(), e);
            Err(ApiError::NotFound(format!("open {}: {}", path.display(), e)))
        }
    }
}
