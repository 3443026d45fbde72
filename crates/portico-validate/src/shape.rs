//! Request shapes: the per-route description of expected body fields.
//!
//! A [`RequestShape`] is an ordered list of fields, each with an ordered list
//! of [`Rule`]s. Rules fall in three phases that always run in this order:
//!
//! 1. presence: [`Rule::Required`], [`Rule::Nullable`]
//! 2. type: [`Rule::String`], [`Rule::Integer`], [`Rule::Numeric`],
//!    [`Rule::Boolean`], [`Rule::Array`], [`Rule::Object`]
//! 3. constraint: size, pattern and membership rules
//!
//! # Example
//!
//! ```rust
//! use portico_validate::{RequestShape, Rule};
//!
//! let shape = RequestShape::new()
//!     .field("name", [Rule::Required, Rule::String, Rule::Max(64.0)])
//!     .field("age", [Rule::Integer, Rule::Between(0.0, 150.0)]);
//!
//! assert_eq!(shape.len(), 2);
//! ```

use regex::Regex;

/// A single field rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// The field must be present, not `null` and not an empty string.
    Required,
    /// An explicit `null` is kept and ends validation of the field.
    Nullable,
    /// The value must be a string.
    String,
    /// The value must be an integer. Numeric strings are converted.
    Integer,
    /// The value must be a number. Numeric strings are converted.
    Numeric,
    /// The value must be a boolean. `"true"`, `"1"`, `"on"` and similar
    /// strings are converted.
    Boolean,
    /// The value must be an array.
    Array,
    /// The value must be an object.
    Object,
    /// Lower bound on size: characters, numeric value, items or fields.
    Min(f64),
    /// Upper bound on size.
    Max(f64),
    /// Inclusive size range.
    Between(f64, f64),
    /// The string value must match the pattern.
    Regex(Regex),
    /// The value must be one of the listed values.
    In(Vec<String>),
    /// The string value must look like an email address.
    Email,
}

/// Which validation phase a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Presence,
    Type,
    Constraint,
}

impl Rule {
    /// Builds a [`Rule::Regex`] from a pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    /// Builds a [`Rule::In`] from any list of values.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    /// The message key base for this rule, e.g. `"required"` or `"min"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Nullable => "nullable",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Between(..) => "between",
            Self::Regex(_) => "regex",
            Self::In(_) => "in",
            Self::Email => "email",
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        match self {
            Self::Required | Self::Nullable => Phase::Presence,
            Self::String
            | Self::Integer
            | Self::Numeric
            | Self::Boolean
            | Self::Array
            | Self::Object => Phase::Type,
            _ => Phase::Constraint,
        }
    }

    /// Whether size messages for this field use the `.string`, `.numeric`,
    /// `.array` or `.object` variant.
    pub(crate) fn size_kind(&self) -> Option<SizeKind> {
        match self {
            Self::String => Some(SizeKind::String),
            Self::Integer | Self::Numeric => Some(SizeKind::Numeric),
            Self::Array => Some(SizeKind::Array),
            Self::Object => Some(SizeKind::Object),
            _ => None,
        }
    }
}

/// How the size of a value is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizeKind {
    String,
    Numeric,
    Array,
    Object,
}

impl SizeKind {
    pub(crate) fn suffix(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A named field with its rules.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    rules: Vec<Rule>,
}

impl Field {
    /// Creates a field.
    pub fn new(name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            name: name.into(),
            rules: rules.into_iter().collect(),
        }
    }

    /// The field name, a top-level key of the request data.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn has(&self, probe: impl Fn(&Rule) -> bool) -> bool {
        self.rules.iter().any(probe)
    }
}

/// The expected shape of a request body, attached to a route.
#[derive(Debug, Clone, Default)]
pub struct RequestShape {
    fields: Vec<Field>,
}

impl RequestShape {
    /// Creates an empty shape. An empty shape still requires a parsable body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push(Field::new(name, rules));
        self
    }

    /// The fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the shape has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_phases() {
        assert_eq!(Rule::Required.phase(), Phase::Presence);
        assert_eq!(Rule::Integer.phase(), Phase::Type);
        assert_eq!(Rule::Min(1.0).phase(), Phase::Constraint);
        assert_eq!(Rule::Email.phase(), Phase::Constraint);
    }

    #[test]
    fn test_regex_rule_rejects_bad_pattern() {
        assert!(Rule::regex("[a-z").is_err());
        assert_eq!(Rule::regex("^[a-z]+$").unwrap().name(), "regex");
    }

    #[test]
    fn test_shape_keeps_field_order() {
        let shape = RequestShape::new()
            .field("b", [Rule::Required])
            .field("a", [Rule::one_of(["x", "y"])]);
        let names: Vec<_> = shape.fields().iter().map(Field::name).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(matches!(&shape.fields()[1].rules()[0], Rule::In(v) if v.len() == 2));
    }
}
