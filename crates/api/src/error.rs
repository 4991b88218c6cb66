use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use minuted_pipeline::PipelineError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(String),
    NotConfigured(String),
    UpstreamTimeout(String),
    Upstream(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Validation(msg) => write!(f, "Validation: {msg}"),
            ApiError::NotConfigured(msg) => write!(f, "Not configured: {msg}"),
            ApiError::UpstreamTimeout(msg) => write!(f, "Upstream timeout: {msg}"),
            ApiError::Upstream(msg) => write!(f, "Upstream failure: {msg}"),
            ApiError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
            ApiError::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg)
            }
            ApiError::UpstreamTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", msg)
            }
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::UnsupportedFormat(_) | PipelineError::EmptyAudio => {
                ApiError::BadRequest(message)
            }
            PipelineError::InconsistentSpeakerMapping(_) => ApiError::Validation(message),
            PipelineError::UpstreamTimeout(_) => ApiError::UpstreamTimeout(message),
            PipelineError::TranscriptionFailed(_)
            | PipelineError::DiarizationFailed(_)
            | PipelineError::UpstreamUnavailable(_)
            | PipelineError::MalformedUpstreamResponse(_) => ApiError::Upstream(message),
        }
    }
}
