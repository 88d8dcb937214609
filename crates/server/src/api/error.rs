//! Error responses shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use webpit_core::ConversionError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// What a failing handler returns.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn bad_request() -> ApiError {
    error(StatusCode::BAD_REQUEST, "bad request")
}

pub fn not_found() -> ApiError {
    error(StatusCode::NOT_FOUND, "not found")
}

pub fn forbidden() -> ApiError {
    error(StatusCode::UNAUTHORIZED, "forbidden")
}

/// HTTP status for a core error.
pub fn status_for(err: &ConversionError) -> StatusCode {
    match err {
        ConversionError::NotFound(_) => StatusCode::NOT_FOUND,
        ConversionError::Processing(_) => StatusCode::ACCEPTED,
        ConversionError::InputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ConversionError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
        ConversionError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ConversionError::InputPending { .. }
        | ConversionError::AlreadyConverted { .. }
        | ConversionError::InvalidState { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<&ConversionError> for ErrorResponse {
    fn from(err: &ConversionError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

pub fn conversion_error(err: &ConversionError) -> ApiError {
    (status_for(err), Json(ErrorResponse::from(err)))
}
