use crate::detection_backend::DetectionBackendError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),
    /// The request body or query string could not be decoded.
    #[error("{0}")]
    Malformed(String),
    #[error(transparent)]
    Upstream(#[from] DetectionBackendError),
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) | RelayError::Malformed(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            RelayError::InvalidInput(msg) | RelayError::Malformed(msg) => msg.clone(),
            other => format!("Detection failed: {}", other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorBody {
                detail: self.detail(),
            }),
        )
            .into_response()
    }
}

/// How a detection route reports a failed call to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Every error becomes an HTTP error response.
    Surface,
    /// Only missing input is an HTTP error; everything else, undecodable
    /// requests included, is reported inside a 200 body with `success: false`.
    InBand,
}

impl FailurePolicy {
    pub fn surfaces(&self, error: &RelayError) -> bool {
        match self {
            FailurePolicy::Surface => true,
            FailurePolicy::InBand => matches!(error, RelayError::InvalidInput(_)),
        }
    }
}
