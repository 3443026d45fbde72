//! Response conversion.
//!
//! Handlers may return anything implementing [`IntoResponse`]:
//!
//! | Type | Status | Content-Type |
//! |------|--------|--------------|
//! | [`Response`] | as built | as built |
//! | [`Json<T>`] | 200 | `application/json` |
//! | `String` / `&'static str` | 200 | `text/plain; charset=utf-8` |
//! | [`StatusCode`] | given | none |
//! | `()` | 204 | none |
//! | `(StatusCode, T)` | given | from `T` |
//! | `Result<T, E>` | from `T` or `E` | from `T` or `E` |
//!
//! # Example
//!
//! ```rust
//! use portico_core::{IntoResponse, Json};
//! use http::StatusCode;
//!
//! let response = (StatusCode::CREATED, Json(serde_json::json!({"id": 1}))).into_response();
//! assert_eq!(response.status(), StatusCode::CREATED);
//! ```

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::Response;

/// Conversion into an HTTP [`Response`].
pub trait IntoResponse {
    /// Builds the response.
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = self;
        response
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        text(StatusCode::OK, self)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        text(StatusCode::OK, self)
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// JSON response wrapper.
///
/// Serializes the inner value with `serde_json` and responds with
/// `200 OK` and `Content-Type: application/json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        json(StatusCode::OK, &self.0)
    }
}

/// Builds a JSON response with the given status.
///
/// Falls back to a `500` with an empty body if serialization fails.
pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, "application/json", Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize JSON response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Builds a `text/plain` response with the given status.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    with_body(
        status,
        "text/plain; charset=utf-8",
        Bytes::from(body.into()),
    )
}

/// Builds the standard `{"error": {"code", "message"}}` error envelope.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message
        }
    });
    json(status, &body)
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = Json(serde_json::json!({"ok": true})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_text_response() {
        let response = "hello".into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "hello");
    }

    #[test]
    fn test_unit_is_no_content() {
        assert_eq!(().into_response().status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_status_tuple_overrides_status() {
        let response = (StatusCode::ACCEPTED, "queued".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_result_err_branch() {
        let result: Result<&'static str, StatusCode> = Err(StatusCode::CONFLICT);
        assert_eq!(result.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_json_error_envelope() {
        let response = json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "no such user");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "no such user");
    }
}
