//! The request gate.
//!
//! [`RequestGate::evaluate`] turns a buffered transport request into a
//! [`ValidationOutcome`]:
//!
//! ```text
//! Request ─▶ parse body + query ─┬─ parse failure ─────────▶ Invalid(Malformed)     400
//!                                └─ fields ─▶ rules ─┬─ any ▶ Invalid(Unprocessable) 422
//!                                                    └─ ok ──▶ Valid(DomainRequest)
//! ```
//!
//! Every field is checked independently and all failures are collected.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use indexmap::IndexMap;
use portico_core::{Params, Request};
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::messages::substitute;
use crate::shape::{Field, Phase, SizeKind};
use crate::{
    DefaultMessages, DomainRequest, MessageResolver, RequestShape, Rule, ValidationErrors,
    ValidationOutcome,
};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("valid email regex"))
}

/// Validates requests against route shapes.
///
/// Cheap to clone; the message catalogue is shared.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use portico_core::Params;
/// use portico_validate::{FailureKind, RequestGate, RequestShape, Rule, ValidationOutcome};
///
/// let gate = RequestGate::default();
/// let shape = RequestShape::new().field("name", [Rule::Required, Rule::String]);
///
/// let request = http::Request::post("/users")
///     .header("content-type", "application/json")
///     .body(Bytes::from_static(b"{}"))
///     .unwrap();
///
/// match gate.evaluate(request, Params::new(), Some(&shape)) {
///     ValidationOutcome::Invalid(errors) => {
///         assert_eq!(errors.kind(), FailureKind::Unprocessable);
///         assert_eq!(errors.field("name").unwrap(), ["The name is required."]);
///     }
///     ValidationOutcome::Valid(_) => unreachable!(),
/// }
/// ```
#[derive(Clone)]
pub struct RequestGate {
    messages: Arc<dyn MessageResolver>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(Arc::new(DefaultMessages::en_us()))
    }
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate").finish_non_exhaustive()
    }
}

impl RequestGate {
    /// Creates a gate that resolves messages through `messages`.
    #[must_use]
    pub fn new(messages: Arc<dyn MessageResolver>) -> Self {
        Self { messages }
    }

    /// Runs the gate.
    ///
    /// Without a shape the request always passes with empty data. With a
    /// shape, the body and query string are parsed and every field rule is
    /// applied.
    pub fn evaluate(
        &self,
        request: Request,
        params: Params,
        shape: Option<&RequestShape>,
    ) -> ValidationOutcome {
        let (parts, body) = request.into_parts();

        let Some(shape) = shape else {
            return ValidationOutcome::Valid(DomainRequest::new(parts, body, params));
        };

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut data = match self.parse_body(&content_type, &body) {
            Ok(data) => data,
            Err(errors) => return self.refuse(&parts, errors),
        };

        if let Some(query) = parts.uri.query() {
            match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
                Ok(pairs) => {
                    for (key, value) in pairs_to_map(pairs) {
                        data.entry(key).or_insert(value);
                    }
                }
                Err(_) => {
                    let errors = ValidationErrors::malformed(self.line("malformed-request"));
                    return self.refuse(&parts, errors);
                }
            }
        }

        let mut failures = IndexMap::new();
        for field in shape.fields() {
            let messages = self.check_field(field, &mut data);
            if !messages.is_empty() {
                failures.insert(field.name().to_string(), messages);
            }
        }

        if !failures.is_empty() {
            return self.refuse(&parts, ValidationErrors::unprocessable(failures));
        }

        ValidationOutcome::Valid(DomainRequest::new(parts, body, params).with_data(data))
    }

    fn refuse(&self, parts: &http::request::Parts, errors: ValidationErrors) -> ValidationOutcome {
        tracing::debug!(
            method = %parts.method,
            path = %parts.uri.path(),
            kind = ?errors.kind(),
            "Request refused by gate"
        );
        ValidationOutcome::Invalid(errors)
    }

    fn parse_body(
        &self,
        content_type: &str,
        body: &Bytes,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        if content_type.starts_with("application/x-www-form-urlencoded") {
            return serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
                .map(pairs_to_map)
                .map_err(|_| ValidationErrors::malformed(self.line("malformed-request")));
        }

        if content_type.starts_with("multipart/") {
            return Err(ValidationErrors::malformed(self.line("malformed-request")));
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ValidationErrors::malformed(self.line("malformed-request"))),
            Err(_) => Err(ValidationErrors::malformed(self.line("malformed-json"))),
        }
    }

    /// Applies one field's rules, converting its value in place. Returns the
    /// failure messages in rule order.
    fn check_field(&self, field: &Field, data: &mut Map<String, Value>) -> Vec<String> {
        let mut messages = Vec::new();
        let name = field.name();
        let nullable = field.has(|r| matches!(r, Rule::Nullable));

        // An empty string counts as absent; it is kept but not checked further
        let present = match data.get(name) {
            None => false,
            Some(Value::Null) => nullable,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };

        if !present {
            if field.has(|r| matches!(r, Rule::Required)) {
                messages.push(self.rule_message(field, "required", &[]));
            }
            if data.get(name).is_some_and(Value::is_null) {
                data.remove(name);
            }
            return messages;
        }

        if data.get(name).is_some_and(Value::is_null) {
            return messages;
        }

        let Some(value) = data.get_mut(name) else {
            return messages;
        };

        for rule in field.rules().iter().filter(|r| r.phase() == Phase::Type) {
            if !coerce(rule, value) {
                messages.push(self.rule_message(field, rule.name(), &[]));
            }
        }
        if !messages.is_empty() {
            return messages;
        }

        let kind = field
            .rules()
            .iter()
            .find_map(Rule::size_kind)
            .or_else(|| infer_kind(value));

        for rule in field.rules().iter().filter(|r| r.phase() == Phase::Constraint) {
            if let Some(message) = self.check_constraint(field, rule, value, kind) {
                messages.push(message);
            }
        }

        messages
    }

    fn check_constraint(
        &self,
        field: &Field,
        rule: &Rule,
        value: &Value,
        kind: Option<SizeKind>,
    ) -> Option<String> {
        match rule {
            Rule::Min(min) => {
                let (size, kind) = size_of(value, kind)?;
                (size < *min).then(|| {
                    self.sized_message(field, "min", kind, &[(":min", format_number(*min))])
                })
            }
            Rule::Max(max) => {
                let (size, kind) = size_of(value, kind)?;
                (size > *max).then(|| {
                    self.sized_message(field, "max", kind, &[(":max", format_number(*max))])
                })
            }
            Rule::Between(min, max) => {
                let (size, kind) = size_of(value, kind)?;
                (size < *min || size > *max).then(|| {
                    self.sized_message(
                        field,
                        "between",
                        kind,
                        &[(":min", format_number(*min)), (":max", format_number(*max))],
                    )
                })
            }
            Rule::Regex(pattern) => {
                let matched = value.as_str().is_some_and(|s| pattern.is_match(s));
                (!matched).then(|| {
                    self.rule_message(field, "regex", &[(":pattern", pattern.as_str().to_string())])
                })
            }
            Rule::In(values) => {
                let found = values.iter().any(|allowed| matches_literal(value, allowed));
                (!found).then(|| self.rule_message(field, "in", &[(":values", values.join(", "))]))
            }
            Rule::Email => {
                let valid = value.as_str().is_some_and(|s| email_regex().is_match(s));
                (!valid).then(|| self.rule_message(field, "email", &[]))
            }
            _ => None,
        }
    }

    fn sized_message(
        &self,
        field: &Field,
        rule: &str,
        kind: SizeKind,
        extra: &[(&str, String)],
    ) -> String {
        self.rule_message(field, &format!("{rule}.{}", kind.suffix()), extra)
    }

    fn rule_message(&self, field: &Field, key: &str, extra: &[(&str, String)]) -> String {
        let template = self.messages.rule(key).unwrap_or(key);
        let display = self
            .messages
            .field_name(field.name())
            .unwrap_or(field.name())
            .to_string();

        let mut replacements = Vec::with_capacity(extra.len() + 1);
        replacements.push((":field", display));
        replacements.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
        substitute(template, &replacements)
    }

    fn line(&self, key: &str) -> String {
        self.messages.line(key).unwrap_or(key).to_string()
    }
}

/// Checks a type rule, converting string input where the rule allows it.
fn coerce(rule: &Rule, value: &mut Value) -> bool {
    match rule {
        Rule::String => value.is_string(),
        Rule::Array => value.is_array(),
        Rule::Object => value.is_object(),
        Rule::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => true,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                    *value = Value::from(f as i64);
                    true
                }
                _ => false,
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => {
                    *value = Value::from(i);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        },
        Rule::Numeric => match value {
            Value::Number(_) => true,
            Value::String(s) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => {
                    *value = Value::Number(n);
                    true
                }
                None => false,
            },
            _ => false,
        },
        Rule::Boolean => {
            let parsed = match value {
                Value::Bool(_) => return true,
                Value::Number(n) => match n.as_u64() {
                    Some(0) => Some(false),
                    Some(1) => Some(true),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "on" | "yes" => Some(true),
                    "false" | "0" | "off" | "no" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            match parsed {
                Some(b) => {
                    *value = Value::Bool(b);
                    true
                }
                None => false,
            }
        }
        _ => true,
    }
}

fn infer_kind(value: &Value) -> Option<SizeKind> {
    match value {
        Value::String(_) => Some(SizeKind::String),
        Value::Number(_) => Some(SizeKind::Numeric),
        Value::Array(_) => Some(SizeKind::Array),
        Value::Object(_) => Some(SizeKind::Object),
        _ => None,
    }
}

fn size_of(value: &Value, kind: Option<SizeKind>) -> Option<(f64, SizeKind)> {
    let kind = kind?;
    let size = match (kind, value) {
        (SizeKind::String, Value::String(s)) => s.chars().count() as f64,
        (SizeKind::Numeric, Value::Number(n)) => n.as_f64()?,
        (SizeKind::Array, Value::Array(a)) => a.len() as f64,
        (SizeKind::Object, Value::Object(o)) => o.len() as f64,
        _ => return None,
    };
    Some((size, kind))
}

fn matches_literal(value: &Value, allowed: &str) -> bool {
    match value {
        Value::String(s) => s == allowed,
        Value::Number(n) => allowed.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => allowed.parse::<bool>().ok() == Some(*b),
        _ => false,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Collects urlencoded pairs into a map. Repeated keys become arrays.
fn pairs_to_map(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        let key = key.strip_suffix("[]").map(str::to_string).unwrap_or(key);
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}
