//! The validated view of an inbound request.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use portico_core::{HandlerError, HandlerResult, Params};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A request that passed the gate.
///
/// Owned by a single handler invocation. `data` holds the merged body and
/// query fields after type conversion: a field declared
/// [`Integer`](crate::Rule::Integer) that arrived as `"42"` is stored as `42`.
///
/// # Example
///
/// ```rust,ignore
/// async fn create_user(req: DomainRequest) -> HandlerResult<Json<User>> {
///     let input: NewUser = req.extract()?;
///     tracing::info!(request_id = %req.id(), "Creating user");
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DomainRequest {
    id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    data: Map<String, Value>,
    body: Bytes,
}

impl DomainRequest {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, params: Params) -> Self {
        Self {
            id: Uuid::now_v7(),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            data: Map::new(),
            body,
        }
    }

    pub(crate) fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Unique, time-ordered id of this request.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path portion of the URI.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameters from the route match.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Validated body and query fields.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// A single data field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Whether a data field is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Raw request body as received.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes the validated data into a typed value.
    ///
    /// A mismatch between the data and `T` is answered with `422`.
    pub fn extract<T: DeserializeOwned>(&self) -> HandlerResult<T> {
        T::deserialize(Value::Object(self.data.clone())).map_err(|e| {
            HandlerError::status(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        })
    }
}
