use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::forwarder::ForwardError;
use crate::rate_limit::Throttle;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("submission throttled: {}", .0.rule())]
    Throttled(Throttle),

    // the old site answered this with a 500 "Failed to save booking"
    #[error("invalid booking payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Throttled(throttle) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": throttle.error(),
                    "message": throttle.message(),
                })),
            )
                .into_response(),
            AppError::InvalidPayload(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid booking payload",
                    "details": details,
                })),
            )
                .into_response(),
            AppError::Forward(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to save booking",
                    "details": e.to_string(),
                })),
            )
                .into_response(),
        }
    }
}
