use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use amparo_core::Error;

/// HTTP projection of the core error taxonomy. Authorization failures map
/// to 403 — distinct from the 401 the auth middleware produces for missing
/// or invalid tokens.
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError(Error::Validation(msg.into()))
    }

    pub fn internal(source: anyhow::Error) -> Self {
        ApiError(Error::Transient(source))
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

fn kind(e: &Error) -> (&'static str, StatusCode) {
    match e {
        Error::Validation(_) => ("validation", StatusCode::BAD_REQUEST),
        Error::Unauthorized { .. } | Error::WrongCity { .. } => {
            ("unauthorized", StatusCode::FORBIDDEN)
        }
        Error::NotFound { .. } => ("not_found", StatusCode::NOT_FOUND),
        Error::InvalidTransition { .. } => ("invalid_transition", StatusCode::CONFLICT),
        Error::Transient(_) => ("transient", StatusCode::INTERNAL_SERVER_ERROR),
        Error::PartialBatch { .. } => ("partial_batch", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, status) = kind(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {:#}", anyhow::Error::new(self.0));
            // Transient details stay in the log; the client gets a retry hint.
            return (
                status,
                Json(json!({
                    "kind": kind,
                    "error": "temporary failure, please retry",
                    "retryable": true,
                })),
            )
                .into_response();
        }

        (
            status,
            Json(json!({
                "kind": kind,
                "error": self.0.to_string(),
                "retryable": self.0.is_retryable(),
            })),
        )
            .into_response()
    }
}
