//! Configuration handed to stage factories and to the engine.
//!
//! [`PipelineConfig`] is the opaque per-run configuration bound into stages.
//! [`EngineSettings`] tunes the engine itself.

mod settings;

pub use settings::{EngineSettings, LogSettings};

use crate::errors::ConfigurationError;
use serde_json::Value;
use std::fmt;

/// A structured configuration value with `/`-separated path access.
///
/// The engine does not interpret its contents; stage factories read what
/// they need through the `require_*` accessors, which fail with a
/// [`ConfigurationError`] naming the offending path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    root: Value,
}

impl PipelineConfig {
    /// Wraps an existing value.
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// An empty configuration.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| ConfigurationError::new(format!("Invalid configuration JSON: {e}")))
    }

    /// The underlying value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Looks up a nested value, e.g. `get("data/args/particle_type")`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |value, key| match value {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Whether a path resolves to a value.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns a sub-tree as its own configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent.
    pub fn section(&self, path: &str) -> Result<Self, ConfigurationError> {
        self.require(path).map(|v| Self::new(v.clone()))
    }

    /// Looks up a required value.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent.
    pub fn require(&self, path: &str) -> Result<&Value, ConfigurationError> {
        self.get(path)
            .ok_or_else(|| ConfigurationError::missing_key(path))
    }

    /// Looks up a required string.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not a string.
    pub fn require_str(&self, path: &str) -> Result<&str, ConfigurationError> {
        self.require(path)?
            .as_str()
            .ok_or_else(|| ConfigurationError::invalid_value(path, "expected a string"))
    }

    /// Looks up a required number.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not numeric.
    pub fn require_f64(&self, path: &str) -> Result<f64, ConfigurationError> {
        self.require(path)?
            .as_f64()
            .ok_or_else(|| ConfigurationError::invalid_value(path, "expected a number"))
    }

    /// Looks up a required non-negative integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not a non-negative integer.
    pub fn require_u64(&self, path: &str) -> Result<u64, ConfigurationError> {
        self.require(path)?.as_u64().ok_or_else(|| {
            ConfigurationError::invalid_value(path, "expected a non-negative integer")
        })
    }

    /// Looks up a required string restricted to a set of options.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent, not a string, or not one of `allowed`.
    pub fn require_one_of<'a>(
        &'a self,
        path: &str,
        allowed: &[&str],
    ) -> Result<&'a str, ConfigurationError> {
        let value = self.require_str(path)?;
        if allowed.contains(&value) {
            Ok(value)
        } else {
            Err(ConfigurationError::invalid_value(
                path,
                format!("'{value}' is not one of [{}]", allowed.join(", ")),
            ))
        }
    }

    /// Looks up a required list of strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not an array of strings.
    pub fn str_list(&self, path: &str) -> Result<Vec<String>, ConfigurationError> {
        let items = self
            .require(path)?
            .as_array()
            .ok_or_else(|| ConfigurationError::invalid_value(path, "expected a list"))?;
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ConfigurationError::invalid_value(path, "expected a list of strings")
                })
            })
            .collect()
    }
}

impl From<Value> for PipelineConfig {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.root) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}", self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> PipelineConfig {
        PipelineConfig::new(json!({
            "data": {"args": {"particle_type": ["stars", "gas"]}},
            "galaxy": {"dist_z": 0.1, "rotation": {"type": "face-on"}},
            "telescope": {"sbin": 25},
        }))
    }

    #[test]
    fn test_nested_lookup() {
        let cfg = config();
        assert_eq!(cfg.get("galaxy/rotation/type"), Some(&json!("face-on")));
        assert_eq!(cfg.get("data/args/particle_type/1"), Some(&json!("gas")));
        assert!(cfg.get("galaxy/rotation/alpha").is_none());
        assert!(cfg.contains("telescope"));
    }

    #[test]
    fn test_missing_key_names_full_path() {
        let err = config().require("galaxy/rotation/alpha").unwrap_err();
        assert_eq!(err.key.as_deref(), Some("galaxy/rotation/alpha"));
        assert_eq!(err.code(), Some("CONFIG-003-MISSING_KEY"));
    }

    #[test]
    fn test_typed_accessors() {
        let cfg = config();
        assert_eq!(cfg.require_f64("galaxy/dist_z").unwrap(), 0.1);
        assert_eq!(cfg.require_u64("telescope/sbin").unwrap(), 25);
        assert!(cfg.require_str("telescope/sbin").is_err());
        assert_eq!(
            cfg.str_list("data/args/particle_type").unwrap(),
            vec!["stars".to_string(), "gas".to_string()]
        );
    }

    #[test]
    fn test_require_one_of() {
        let cfg = config();
        assert_eq!(
            cfg.require_one_of("galaxy/rotation/type", &["face-on", "edge-on"])
                .unwrap(),
            "face-on"
        );
        let err = cfg
            .require_one_of("galaxy/rotation/type", &["edge-on"])
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-004-INVALID_VALUE"));
    }

    #[test]
    fn test_from_json_str() {
        let cfg = PipelineConfig::from_json_str(r#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(cfg.require_u64("a/b").unwrap(), 1);
        assert!(PipelineConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_section() {
        let galaxy = config().section("galaxy").unwrap();
        assert_eq!(galaxy.require_str("rotation/type").unwrap(), "face-on");
    }
}
