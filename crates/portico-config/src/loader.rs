//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, explicit overrides and environment
//! variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::config::parse_bool;
use crate::{Config, ConfigError};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file or string (TOML or JSON)
/// 3. Explicit overrides from [`with_value`](Self::with_value)
/// 4. Environment variables
///
/// # Example
///
/// ```no_run
/// use portico_config::ConfigLoader;
///
/// # fn main() -> Result<(), portico_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("portico.toml")?
///     .with_env_prefix("PORTICO")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: Config,
    overrides: Vec<(String, Value)>,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader seeded with [`Config::defaults`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::defaults(),
            overrides: Vec::new(),
            env_prefix: None,
        }
    }

    /// Drop all defaults and start from an empty tree.
    #[must_use]
    pub fn without_defaults(mut self) -> Self {
        self.config = Config::empty();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, cannot be read,
    /// has an unknown extension or contains invalid TOML/JSON.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        self.with_string(&content, &extension)
    }

    /// Load configuration from an optional file. Missing files are skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     host = "0.0.0.0"
    ///     port = 3000
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.get_str("server.host"), Some("0.0.0.0"));
    /// assert_eq!(config.get_uint("server.port"), Some(3000));
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let parsed: Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        if !parsed.is_object() {
            return Err(ConfigError::NotATable);
        }

        self.config.merge(parsed);
        Ok(self)
    }

    /// Set a single value by dotted key. Applied after files, before the
    /// environment.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`; segments
    /// match existing keys case-insensitively, so
    /// `PORTICO__SERVER__WRITETIMEOUT=30` overrides `server.writeTimeout`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e.to_string())),
        }
    }

    /// Finalize and return the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment override cannot be parsed or
    /// the final configuration fails validation.
    pub fn load(self) -> Result<Config, ConfigError> {
        let config = self.load_unvalidated()?;
        validate(&config)?;
        Ok(config)
    }

    /// Finalize without validation.
    pub fn load_unvalidated(mut self) -> Result<Config, ConfigError> {
        for (key, value) in std::mem::take(&mut self.overrides) {
            self.config.set(&key, value);
        }

        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            apply_env_vars(&mut self.config, &prefix, vars)?;
        }

        Ok(self.config)
    }
}

fn apply_env_vars(
    config: &mut Config,
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ConfigError> {
    for (key, value) in vars {
        let Some(rest) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            continue;
        };
        let segments: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        apply_env_var(config.root_mut(), &segments, &key, &value)?;
    }
    Ok(())
}

fn apply_env_var(
    root: &mut Value,
    segments: &[&str],
    var: &str,
    raw: &str,
) -> Result<(), ConfigError> {
    let mut node = root;
    for (i, segment) in segments.iter().enumerate() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return Ok(());
        };

        let key = map
            .keys()
            .find(|k| k.eq_ignore_ascii_case(segment))
            .cloned()
            .unwrap_or_else(|| segment.to_lowercase());

        if i + 1 == segments.len() {
            let typed = typed_like(map.get(&key), raw)
                .ok_or_else(|| ConfigError::env_parse_error(var, expected_kind(map.get(&key))))?;
            map.insert(key, typed);
            return Ok(());
        }

        node = map
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

// Parse `raw` to the same JSON type as the value it replaces.
fn typed_like(existing: Option<&Value>, raw: &str) -> Option<Value> {
    match existing {
        Some(Value::Bool(_)) => parse_bool(raw).map(Value::Bool),
        Some(Value::Number(n)) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Some(Value::Number(_)) => raw.trim().parse::<i64>().ok().map(Value::from),
        _ => Some(Value::String(raw.to_string())),
    }
}

fn expected_kind(existing: Option<&Value>) -> &'static str {
    match existing {
        Some(Value::Bool(_)) => "expected boolean",
        Some(Value::Number(n)) if n.is_f64() => "expected float",
        Some(Value::Number(_)) => "expected integer",
        _ => "expected string",
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.has("server.port") {
        match config.get_int("server.port") {
            Some(port) if (0..=65_535).contains(&port) => {}
            Some(_) => {
                return Err(ConfigError::invalid_value(
                    "server.port",
                    "must be between 0 and 65535",
                ))
            }
            None => {
                return Err(ConfigError::invalid_value(
                    "server.port",
                    "must be an integer",
                ))
            }
        }
    }

    for key in ["server.writeTimeout", "server.readTimeout", "server.idleTimeout"] {
        if config.has(key) && config.get_uint(key).is_none() {
            return Err(ConfigError::invalid_value(
                key,
                "must be a non-negative number of seconds",
            ));
        }
    }

    if config.has("server.proxy.port") {
        match config.get_int("server.proxy.port") {
            Some(port) if (1..=65_535).contains(&port) => {}
            _ => {
                return Err(ConfigError::invalid_value(
                    "server.proxy.port",
                    "must be between 1 and 65535",
                ))
            }
        }
    }

    if let Some(protocol) = config.get("server.proxy.protocol").filter(|v| !v.is_null()) {
        match protocol.as_str() {
            Some("http" | "https") => {}
            _ => {
                return Err(ConfigError::invalid_value(
                    "server.proxy.protocol",
                    "must be \"http\" or \"https\"",
                ))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, Config::defaults());
    }

    #[test]
    fn test_loader_with_string_json() {
        let config = ConfigLoader::new()
            .with_string(r#"{"server": {"domain": "api.example.com"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.get_str("server.domain"), Some("api.example.com"));
        assert_eq!(config.get_uint("server.port"), Some(8080));
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        let err = ConfigLoader::new().with_string("a: 1", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(f) if f == "yaml"));
    }

    #[test]
    fn test_loader_rejects_non_table_json() {
        let err = ConfigLoader::new().with_string("[1]", "json").unwrap_err();
        assert!(matches!(err, ConfigError::NotATable));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server.proxy]\nhost = \"edge.example.com\"\nprotocol = \"https\"").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.get_str("server.proxy.host"), Some("edge.example.com"));
        assert_eq!(config.get_str("server.proxy.protocol"), Some("https"));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/portico.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/portico.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.get_str("app.name"), Some("portico"));
    }

    #[test]
    fn test_with_value_overrides_file() {
        let config = ConfigLoader::new()
            .with_string("[server]\nport = 3000", "toml")
            .unwrap()
            .with_value("server.port", 4000)
            .load()
            .unwrap();
        assert_eq!(config.get_uint("server.port"), Some(4000));
    }

    #[test]
    fn test_env_vars_match_case_insensitively() {
        let mut config = Config::defaults();
        apply_env_vars(
            &mut config,
            "PORTICO",
            vars(&[
                ("PORTICO__SERVER__WRITETIMEOUT", "30"),
                ("PORTICO__APP__DEBUG", "false"),
                ("PORTICO__SERVER__PROXY__HOST", "edge"),
            ]),
        )
        .unwrap();

        assert_eq!(config.get_uint("server.writeTimeout"), Some(30));
        assert!(config.get("server.writetimeout").is_none());
        assert_eq!(config.get_bool("app.debug"), Some(false));
        assert_eq!(config.get_str("server.proxy.host"), Some("edge"));
    }

    #[test]
    fn test_env_var_invalid_integer() {
        let mut config = Config::defaults();
        let err = apply_env_vars(
            &mut config,
            "PORTICO",
            vars(&[("PORTICO__SERVER__PORT", "eighty")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_env_var_without_separator_is_ignored() {
        let mut config = Config::defaults();
        apply_env_vars(&mut config, "PORTICO", vars(&[("PORTICO_HOME", "/opt")])).unwrap();
        assert_eq!(config, Config::defaults());
    }

    #[test]
    fn test_validation_port_range() {
        let err = ConfigLoader::new()
            .with_value("server.port", 70_000)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "server.port"));
    }

    #[test]
    fn test_validation_negative_timeout() {
        let err = ConfigLoader::new()
            .with_value("server.readTimeout", -1)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "server.readTimeout"));
    }

    #[test]
    fn test_validation_proxy_protocol() {
        let err = ConfigLoader::new()
            .with_value("server.proxy.protocol", "gopher")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        assert!(ConfigLoader::new()
            .with_value("server.proxy.protocol", "https")
            .load()
            .is_ok());
    }

    #[test]
    fn test_load_unvalidated_skips_checks() {
        let config = ConfigLoader::new()
            .with_value("server.port", 70_000)
            .load_unvalidated()
            .unwrap();
        assert_eq!(config.get_uint("server.port"), Some(70_000));
    }
}
