use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// PortalError
///
/// The error vocabulary of the orchestration layer. Every variant is recoverable:
/// the caller can retry after any single failure.
///
/// - `TransportUnavailable`: no live connection to the remote service. Queries treat this
///   as "not yet runnable"; mutations surface it to the caller.
/// - `RequestFailed`: the remote call was rejected or errored.
/// - `ValidationViolation`: a required text field was empty at submission, so the
///   remote service was never contacted.
/// - `NotFound`: a BFF lookup (post id, route segment) resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    #[error("remote service is not connected")]
    TransportUnavailable,
    #[error("remote request failed: {0}")]
    RequestFailed(String),
    #[error("required field `{field}` is empty")]
    ValidationViolation { field: &'static str },
    #[error("not found")]
    NotFound,
}

impl PortalError {
    /// The HTTP status the BFF answers with when this error reaches a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::TransportUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::RequestFailed(_) => StatusCode::BAD_GATEWAY,
            PortalError::ValidationViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            PortalError::TransportUnavailable
        } else {
            PortalError::RequestFailed(err.to_string())
        }
    }
}

/// Mutation failures are surfaced to the initiating actor as a JSON body
/// `{ "error": "<message>" }` with a status derived from the variant.
impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
