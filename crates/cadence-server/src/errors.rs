//! HTTP error rendering.
//!
//! Every failure leaves the server as `{"error": {"code": ..., "message": ...}}`
//! with a status derived from the error kind.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cadence_inference::PredictError;
use serde_json::json;
use tracing::error;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The prediction pipeline refused or failed.
    #[error(transparent)]
    Predict(#[from] PredictError),

    /// Malformed multipart body, missing file field, or empty upload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Body exceeded the configured upload ceiling.
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),

    /// The request outlived the configured timeout.
    #[error("request timed out")]
    Timeout,
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Predict(e) => e.code(),
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Timeout => "REQUEST_TIMEOUT",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Predict(e) => match e {
                PredictError::Decode(_) | PredictError::Normalization(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PredictError::ServiceNotReady { .. } | PredictError::StartupFailed(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                PredictError::Aggregation(_)
                | PredictError::Classification(_)
                | PredictError::Inference(_)
                | PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::InvalidRequest(e.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::InvalidRequest(e.body_text())
        }
    }
}

/// Give the bare 408 produced by the timeout layer the JSON envelope.
pub(crate) async fn envelope_timeout(resp: Response) -> Response {
    if resp.status() == StatusCode::REQUEST_TIMEOUT {
        ApiError::Timeout.into_response()
    } else {
        resp
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(code = self.code(), error = %self, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
