use crate::executor::ExecutionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Execution(err) => match err {
                ExecutionError::RuntimeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ExecutionError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                ExecutionError::Runtime(_) | ExecutionError::MalformedStream(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ExecutionError::Io(_)
                | ExecutionError::ImageNotFound(_)
                | ExecutionError::CreateFailed(_)
                | ExecutionError::StartFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Execution(err) => err.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            message: self.to_string(),
            code: self.code(),
        };

        (self.status(), Json(body)).into_response()
    }
}
