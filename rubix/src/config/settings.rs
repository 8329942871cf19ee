//! Engine settings.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Settings controlling how pipelines execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Check declared reads and writes between stages (unfused form only).
    #[serde(default = "default_validate_contracts")]
    pub validate_contracts: bool,
    /// Reject stages that modify attributes they did not declare as written.
    #[serde(default)]
    pub strict_ownership: bool,
    /// Maximum number of shape specializations kept by a compiled sequence.
    #[serde(default = "default_cache_capacity")]
    pub compiled_cache_capacity: usize,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogSettings,
}

fn default_validate_contracts() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    16
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            validate_contracts: default_validate_contracts(),
            strict_ownership: false,
            compiled_cache_capacity: default_cache_capacity(),
            log: LogSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables inter-stage contract checks.
    #[must_use]
    pub fn with_validate_contracts(mut self, enabled: bool) -> Self {
        self.validate_contracts = enabled;
        self
    }

    /// Enables or disables strict write ownership.
    #[must_use]
    pub fn with_strict_ownership(mut self, enabled: bool) -> Self {
        self.strict_ownership = enabled;
        self
    }

    /// Sets the compiled cache capacity (at least one entry).
    #[must_use]
    pub fn with_compiled_cache_capacity(mut self, capacity: usize) -> Self {
        self.compiled_cache_capacity = capacity.max(1);
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_log(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let settings: EngineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings.validate_contracts);
        assert!(!settings.strict_ownership);
        assert_eq!(settings.compiled_cache_capacity, 16);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_partial_override() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"strict_ownership": true, "log": {"json": true}}"#).unwrap();
        assert!(settings.strict_ownership);
        assert!(settings.log.json);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_capacity_floor() {
        let settings = EngineSettings::new().with_compiled_cache_capacity(0);
        assert_eq!(settings.compiled_cache_capacity, 1);
    }
}
