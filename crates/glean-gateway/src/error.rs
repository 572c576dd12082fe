use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use glean_core::{ErrorKind, GleanError};
use serde_json::json;
use tracing::error;

/// An error rendered as `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl ApiError {
    /// An error with an explicit status and kind.
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body shared by error responses and bulk item failures.
    pub fn body(kind: &str, message: &str) -> serde_json::Value {
        json!({ "error": { "kind": kind, "message": message } })
    }
}

/// `InvalidTask` is a client error, `NotFound` a missing resource, anything
/// else a server error.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidTask => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<GleanError> for ApiError {
    fn from(err: GleanError) -> Self {
        let kind = err.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!(kind = %kind, error = %err, "Request failed");
        }
        Self::new(status, kind.to_string(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Self::body(&self.kind, &self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidTask), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::StoreError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_glean_error() {
        let err = ApiError::from(GleanError::NotFound("task 42".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind, "not_found");
        assert!(err.message.contains("task 42"));
    }
}
