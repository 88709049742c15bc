//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cellserve_runner::repository::StoreError;
use cellserve_runner::scheduler::{PoolError, RunnerError};

use crate::service::submission_service::SubmitError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    StoreError(StoreError),
    Unavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::StoreError(err) => {
                tracing::error!("Status store error: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Status store unavailable".to_string(),
                )
            }
            ApiError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (
            status,
            Json(serde_json::json!({ "ok": false, "error": message })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreError(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Upload(err) => {
                ApiError::InternalError(format!("Failed to store upload: {}", err))
            }
            SubmitError::Runner(RunnerError::Store(err)) => ApiError::StoreError(err),
            SubmitError::Runner(RunnerError::Pool(PoolError::ShutDown)) => {
                ApiError::Unavailable("Server is shutting down".to_string())
            }
            SubmitError::Runner(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
