use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::normalizer::NormalizeError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Normalize(e) => match e {
                NormalizeError::EmptyInput => (StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
                NormalizeError::NoStructuredOutput => {
                    (StatusCode::BAD_GATEWAY, "NO_STRUCTURED_OUTPUT")
                }
                NormalizeError::MalformedResponse(_) => {
                    (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE")
                }
                NormalizeError::UpstreamUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE")
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Normalize(NormalizeError::MalformedResponse(detail)) => {
                tracing::warn!("Malformed completion response: {}", detail);
                "The completion service returned an unusable event".to_string()
            }
            AppError::Normalize(NormalizeError::UpstreamUnavailable(detail)) => {
                tracing::error!("Completion service error: {}", detail);
                "The completion service is unavailable, please try again".to_string()
            }
            AppError::Normalize(e) => e.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
