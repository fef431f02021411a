//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use adreel_models::{FailureDetail, FailureKind, Stage};
use adreel_queue::QueueError;
use adreel_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Structured `{stage?, kind, detail}` view of this error.
    pub fn failure_detail(&self) -> FailureDetail {
        match self {
            ApiError::Validation(msg) => FailureDetail::new(FailureKind::Validation, msg.clone()),
            ApiError::NotFound(msg) => FailureDetail::new(FailureKind::MissingAsset, msg.clone()),
            ApiError::Internal(msg) => FailureDetail::new(FailureKind::Internal, msg.clone()),
            ApiError::Worker(e) => e.to_failure_detail(),
            ApiError::Queue(e) => FailureDetail::new(FailureKind::Internal, e.to_string()),
        }
    }
}

/// HTTP status for a failure kind.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::MissingAsset => StatusCode::NOT_FOUND,
        FailureKind::RemoteService | FailureKind::Transfer => StatusCode::BAD_GATEWAY,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::CompositionStage
        | FailureKind::InvalidConfiguration
        | FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
    kind: FailureKind,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let failure = self.failure_detail();
        let status = status_for(failure.kind);

        // Don't expose internal error details in production
        let detail = if failure.kind == FailureKind::Internal
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            failure.message
        };

        let body = ErrorResponse {
            success: false,
            stage: failure.stage,
            kind: failure.kind,
            detail,
            code: failure.code,
        };

        (status, Json(body)).into_response()
    }
}
