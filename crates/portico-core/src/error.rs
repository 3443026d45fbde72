//! Handler error type.
//!
//! [`HandlerError`] is what a handler returns to abort its own request.
//! It converts into a JSON error envelope with a matching status code;
//! internal errors are logged and their details are not exposed.

use http::StatusCode;
use thiserror::Error;

use crate::response::json_error;
use crate::{IntoResponse, Response};

/// Result type alias for handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Error returned by a request handler.
///
/// # Example
///
/// ```
/// use portico_core::HandlerError;
/// use http::StatusCode;
///
/// let err = HandlerError::not_found("user 42");
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
/// ```
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The request was understood but rejected by business logic.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An explicit status with a client-visible message.
    #[error("{message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Client-visible message.
        message: String,
    },

    /// Internal failure. Details are logged, never sent to the client.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HandlerError {
    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates an error with an explicit status.
    #[must_use]
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error wrapping a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Status { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Status { .. } => "REQUEST_FAILED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal { source, .. } => {
                tracing::error!(
                    error = %self,
                    source = source.as_ref().map(ToString::to_string),
                    "Handler failed"
                );
                json_error(status, self.error_code(), "Internal Server Error")
            }
            Self::BadRequest(message) | Self::NotFound(message) => {
                json_error(status, self.error_code(), message)
            }
            Self::Status { message, .. } => json_error(status, self.error_code(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            HandlerError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HandlerError::status(StatusCode::CONFLICT, "taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            HandlerError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_source_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = HandlerError::internal_with_source("write failed", io);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk gone");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = HandlerError::internal("database password rejected").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("password"));
        assert!(body.contains("Internal Server Error"));
    }
}
