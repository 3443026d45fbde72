//! Human-readable messages for validation failures.
//!
//! The gate never hard-codes message text. It asks a [`MessageResolver`] for
//! a line by key and substitutes placeholders itself:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `:field` | display name of the field |
//! | `:min`, `:max` | bounds of a size rule |
//! | `:values` | comma-separated allowed values |
//! | `:pattern` | the regex source |

use std::collections::HashMap;

/// Lookup of message lines by key.
///
/// Missing keys fall back to the key itself, so a misconfigured resolver
/// degrades to readable output rather than failing the request.
pub trait MessageResolver: Send + Sync {
    /// A general line such as `malformed-json`.
    fn line(&self, key: &str) -> Option<&str>;

    /// A validation rule message such as `required` or `min.string`.
    fn rule(&self, key: &str) -> Option<&str>;

    /// Display name for a field, if it differs from the field key.
    fn field_name(&self, field: &str) -> Option<&str>;
}

/// Built-in `en-US` messages.
///
/// Individual lines can be overridden, which is useful to adapt wording
/// without writing a full resolver.
///
/// ```rust
/// use portico_validate::{DefaultMessages, MessageResolver};
///
/// let mut messages = DefaultMessages::en_us();
/// messages.set_rule("required", "Please provide :field.");
/// assert_eq!(messages.rule("required"), Some("Please provide :field."));
/// ```
#[derive(Debug, Clone)]
pub struct DefaultMessages {
    lines: HashMap<String, String>,
    rules: HashMap<String, String>,
    fields: HashMap<String, String>,
}

impl Default for DefaultMessages {
    fn default() -> Self {
        Self::en_us()
    }
}

const LINES: &[(&str, &str)] = &[
    ("malformed-request", "Malformed request"),
    ("malformed-json", "Malformed JSON"),
];

const RULES: &[(&str, &str)] = &[
    ("required", "The :field is required."),
    ("string", "The :field must be a string."),
    ("integer", "The :field must be an integer."),
    ("numeric", "The :field must be numeric."),
    ("boolean", "The :field must be a boolean."),
    ("array", "The :field must be an array."),
    ("object", "The :field must be an object."),
    ("min.string", "The :field must be at least :min characters."),
    ("min.numeric", "The :field must be at least :min."),
    ("min.array", "The :field must have at least :min items."),
    ("min.object", "The :field must have at least :min fields."),
    ("max.string", "The :field may not have more than :max characters."),
    ("max.numeric", "The :field may not be greater than :max."),
    ("max.array", "The :field may not have more than :max items."),
    ("max.object", "The :field may not have more than :max fields."),
    ("between.string", "The :field must be between :min and :max characters."),
    ("between.numeric", "The :field must be between :min and :max."),
    ("between.array", "The :field must have between :min and :max items."),
    ("between.object", "The :field must have between :min and :max fields."),
    ("regex", "The :field format is invalid."),
    ("in", "The :field must have one of the following values: :values."),
    ("email", "The :field must be a valid email address."),
];

const FIELDS: &[(&str, &str)] = &[("", "body"), ("email", "email address")];

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

impl DefaultMessages {
    /// The `en-US` catalogue.
    #[must_use]
    pub fn en_us() -> Self {
        Self {
            lines: to_map(LINES),
            rules: to_map(RULES),
            fields: to_map(FIELDS),
        }
    }

    /// Overrides a general line.
    pub fn set_line(&mut self, key: impl Into<String>, line: impl Into<String>) {
        self.lines.insert(key.into(), line.into());
    }

    /// Overrides a rule message.
    pub fn set_rule(&mut self, key: impl Into<String>, line: impl Into<String>) {
        self.rules.insert(key.into(), line.into());
    }

    /// Sets the display name used for `:field`.
    pub fn set_field_name(&mut self, field: impl Into<String>, name: impl Into<String>) {
        self.fields.insert(field.into(), name.into());
    }
}

impl MessageResolver for DefaultMessages {
    fn line(&self, key: &str) -> Option<&str> {
        self.lines.get(key).map(String::as_str)
    }

    fn rule(&self, key: &str) -> Option<&str> {
        self.rules.get(key).map(String::as_str)
    }

    fn field_name(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Replaces each `(placeholder, value)` in `template`, longest placeholder
/// first.
pub(crate) fn substitute(template: &str, replacements: &[(&str, String)]) -> String {
    let mut ordered: Vec<_> = replacements.iter().collect();
    ordered.sort_by_key(|(placeholder, _)| std::cmp::Reverse(placeholder.len()));

    let mut out = template.to_string();
    for (placeholder, value) in ordered {
        out = out.replace(placeholder, value);
    }
    out
}
