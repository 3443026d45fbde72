//! Read-only dotted-key view over a configuration tree.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Loaded configuration.
///
/// Values live in a JSON tree and are addressed with dotted keys such as
/// `server.proxy.host`. Typed getters are lenient: a string holding a
/// number or boolean is accepted, since environment overrides for keys
/// without a default arrive as strings.
///
/// # Example
///
/// ```
/// use portico_config::Config;
///
/// let config = Config::defaults();
/// assert_eq!(config.get_str("server.host"), Some("127.0.0.1"));
/// assert_eq!(config.get_uint("server.port"), Some(8080));
/// assert!(!config.has("server.proxy.host"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Built-in default values.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            root: serde_json::json!({
                "app": {
                    "name": "portico",
                    "environment": "localhost",
                    "debug": true,
                    "defaultLanguage": "en-US"
                },
                "server": {
                    "host": "127.0.0.1",
                    "domain": "",
                    "port": 8080,
                    "writeTimeout": 10,
                    "readTimeout": 10,
                    "idleTimeout": 20
                },
                "database": {
                    "connection": "none"
                }
            }),
        }
    }

    /// An empty configuration.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing tree. A non-object root yields an empty config.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        if root.is_object() {
            Self { root }
        } else {
            Self::empty()
        }
    }

    /// The underlying tree.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Looks up a value by dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |node, segment| node.as_object()?.get(segment))
    }

    /// Returns `true` if the key exists and is not `null`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// String value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Signed integer value.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Unsigned integer value.
    #[must_use]
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point value.
    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Deserializes the value (often a whole section) at `key`.
    ///
    /// Returns `None` when the key is absent or the value does not fit `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        T::deserialize(self.get(key)?).ok()
    }

    /// Sets a value, creating intermediate tables as needed.
    ///
    /// A non-table value on the path is replaced by a table.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let mut node = &mut self.root;
        let mut segments = key.split('.').peekable();
        while let Some(segment) = segments.next() {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return;
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value.into());
                return;
            }
            node = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }

    /// Deep-merges `other` into this configuration. Tables merge key by key;
    /// any other value in `other` replaces the existing one.
    pub fn merge(&mut self, other: Value) {
        merge_values(&mut self.root, other);
    }

    pub(crate) fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Parse a boolean from a string.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
