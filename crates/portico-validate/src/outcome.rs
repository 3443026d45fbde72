//! Validation outcome and its wire format.

use http::StatusCode;
use indexmap::IndexMap;
use portico_core::{response, IntoResponse, Response};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::DomainRequest;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The body could not be parsed at all. Maps to `400 Bad Request`.
    Malformed,
    /// The body parsed but broke one or more field rules. Maps to
    /// `422 Unprocessable Entity`.
    Unprocessable,
}

impl FailureKind {
    /// The HTTP status for this kind of failure.
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::Malformed => StatusCode::BAD_REQUEST,
            Self::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Errors produced by the gate, tagged with their [`FailureKind`].
///
/// Serializes as `{"error": "<message>"}` when malformed and as
/// `{"validationError": {"<field>": ["<message>", ...]}}` when unprocessable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    kind: FailureKind,
    message: Option<String>,
    fields: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// A malformed-body failure with a single top-level message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Malformed,
            message: Some(message.into()),
            fields: IndexMap::new(),
        }
    }

    /// A field-rule failure.
    #[must_use]
    pub fn unprocessable(fields: IndexMap<String, Vec<String>>) -> Self {
        Self {
            kind: FailureKind::Unprocessable,
            message: None,
            fields,
        }
    }

    /// The failure tag.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Whether the body could not be parsed.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.kind == FailureKind::Malformed
    }

    /// The top-level message of a malformed failure.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Field name to ordered messages. Empty for malformed failures.
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Vec<String>> {
        &self.fields
    }

    /// Messages recorded for one field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// The HTTP status for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self.kind {
            FailureKind::Malformed => {
                map.serialize_entry("error", self.message.as_deref().unwrap_or_default())?;
            }
            FailureKind::Unprocessable => {
                map.serialize_entry("validationError", &self.fields)?;
            }
        }
        map.end()
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        response::json(self.status(), &self)
    }
}

/// Result of running the gate over a request.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// The request passed; the handler may run.
    Valid(DomainRequest),
    /// The request was refused; the handler must not run.
    Invalid(ValidationErrors),
}

impl ValidationOutcome {
    /// Whether the request passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<DomainRequest, ValidationErrors> {
        match self {
            Self::Valid(request) => Ok(request),
            Self::Invalid(errors) => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_wire_shape() {
        let errors = ValidationErrors::malformed("Malformed JSON");
        assert_eq!(errors.status(), StatusCode::BAD_REQUEST);
        assert!(errors.fields().is_empty());
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({"error": "Malformed JSON"})
        );
    }

    #[test]
    fn test_unprocessable_wire_shape_keeps_field_order() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), vec!["The name is required.".to_string()]);
        fields.insert("age".to_string(), vec!["The age must be an integer.".to_string()]);
        let errors = ValidationErrors::unprocessable(fields);

        assert_eq!(errors.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(errors.message().is_none());
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(
            json,
            r#"{"validationError":{"name":["The name is required."],"age":["The age must be an integer."]}}"#
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ValidationErrors::malformed("Malformed request").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
