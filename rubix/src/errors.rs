//! Error types for the rubix pipeline engine.
//!
//! Three families of failure are distinguished:
//!
//! - [`ConfigurationError`]: raised while binding or registering stages,
//!   never while a pipeline is running.
//! - [`StageExecutionError`]: a stage callable failed during a run.
//! - [`ContractViolationError`]: a stage produced a context that breaks the
//!   attribute contract declared by itself or by a later stage.

use crate::context::{AttributeRef, RubixData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Boxed error produced by a stage callable.
pub type BoxedStageError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for rubix operations.
#[derive(Debug, Error)]
pub enum RubixError {
    /// Malformed configuration or stage sequence.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A stage failed while the pipeline was running.
    #[error("{0}")]
    StageExecution(#[from] StageExecutionError),

    /// A stage broke the attribute contract between stages.
    #[error("{0}")]
    ContractViolation(#[from] ContractViolationError),
}

impl RubixError {
    /// Returns the stage execution error, if this is one.
    #[must_use]
    pub fn as_stage_execution(&self) -> Option<&StageExecutionError> {
        match self {
            Self::StageExecution(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the configuration error, if this is one.
    #[must_use]
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the contract violation, if this is one.
    #[must_use]
    pub fn as_contract_violation(&self) -> Option<&ContractViolationError> {
        match self {
            Self::ContractViolation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the last context known to be valid, when the error carries one.
    #[must_use]
    pub fn last_good(&self) -> Option<&RubixData> {
        self.as_stage_execution().map(StageExecutionError::last_good)
    }
}

/// Structured diagnostics attached to configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-002-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info, pre-filled with the canned hint for `code`.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ErrorSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON representation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        serde_json::Value::Object(map)
    }
}

/// Error raised when configuration or a stage sequence is malformed.
///
/// Raised at bind or register time only.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stage being bound or registered, if known.
    pub stage: Option<String>,
    /// The configuration path involved, if any.
    pub key: Option<String>,
    /// Structured diagnostics.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            key: None,
            error_info: None,
        }
    }

    /// Sets the stage involved.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the configuration path involved.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the structured diagnostics.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Attaches a stage name unless one is already set.
    #[must_use]
    pub fn in_stage(mut self, stage: &str) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.to_string());
        }
        self
    }

    /// Returns the diagnostic code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// A required configuration key is absent.
    #[must_use]
    pub fn missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(format!("Key '{key}' not found in config"))
            .with_error_info(
                ErrorInfo::new("CONFIG-003-MISSING_KEY", format!("Missing key '{key}'"))
                    .with_context_entry("key", key.clone()),
            )
            .with_key(key)
    }

    /// A configuration key holds a value of the wrong type or outside its domain.
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        let key = key.into();
        Self::new(format!("Invalid value for '{key}': {reason}"))
            .with_error_info(
                ErrorInfo::new("CONFIG-004-INVALID_VALUE", format!("Invalid value for '{key}'"))
                    .with_context_entry("key", key.clone()),
            )
            .with_key(key)
    }

    /// The stage sequence passed to `register` was empty.
    #[must_use]
    pub fn empty_sequence() -> Self {
        Self::new("Stage sequence is empty").with_error_info(ErrorInfo::new(
            "CONFIG-001-EMPTY",
            "Cannot register an empty stage sequence",
        ))
    }

    /// Two stages in one sequence share a name.
    #[must_use]
    pub fn duplicate_stage(name: impl Into<String>, first: usize, second: usize) -> Self {
        let name = name.into();
        Self::new(format!(
            "Duplicate stage name '{name}' at positions {first} and {second}"
        ))
        .with_error_info(
            ErrorInfo::new("CONFIG-002-DUPLICATE", format!("Stage '{name}' registered twice"))
                .with_context_entry("first", first.to_string())
                .with_context_entry("second", second.to_string()),
        )
        .with_stage(name)
    }

    /// A stage name does not satisfy the naming rules.
    #[must_use]
    pub fn invalid_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("Invalid stage name '{name}'"))
            .with_error_info(ErrorInfo::new(
                "CONFIG-005-INVALID_NAME",
                format!("Stage name '{name}' is not a valid identifier"),
            ))
            .with_stage(name)
    }

    /// A stage name is not known to the registry.
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(format!("Unknown stage '{name}'"))
            .with_error_info(ErrorInfo::new(
                "CONFIG-006-UNKNOWN_STAGE",
                format!("No factory registered for '{name}'"),
            ))
            .with_stage(name)
    }

    /// A required particle category is never referenced by the sequence.
    #[must_use]
    pub fn missing_category(category: impl fmt::Display) -> Self {
        Self::new(format!(
            "Particle category '{category}' is not referenced by any stage"
        ))
        .with_error_info(ErrorInfo::new(
            "CONFIG-007-MISSING_CATEGORY",
            format!("Category '{category}' unused"),
        ))
    }
}

/// Identifies where in a sequence a stage failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageLocator {
    /// A single stage of an unfused pipeline.
    Stage {
        /// The stage name.
        name: String,
        /// Zero-based position in the sequence.
        index: usize,
    },
    /// A fused sequence; the failing inner stage is not pinpointed.
    Sequence {
        /// Fingerprint of the sequence's expression form.
        fingerprint: String,
        /// Number of stages in the sequence.
        stage_count: usize,
    },
}

impl fmt::Display for StageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage { name, index } => write!(f, "stage '{name}' (#{})", index + 1),
            Self::Sequence {
                fingerprint,
                stage_count,
            } => {
                let short = fingerprint.get(..12).unwrap_or(fingerprint);
                write!(f, "compiled sequence {short} ({stage_count} stages)")
            }
        }
    }
}

/// Error raised when a stage callable fails during a run.
///
/// Carries the context as it was before the failing stage ran.
#[derive(Debug, Error)]
#[error("Stage execution failed in {locator}: {source}")]
pub struct StageExecutionError {
    /// Where the failure happened.
    pub locator: StageLocator,
    /// The stage's own error.
    #[source]
    pub source: BoxedStageError,
    last_good: Box<RubixData>,
}

impl StageExecutionError {
    /// Creates an error for a stage of an unfused pipeline.
    #[must_use]
    pub fn at_stage(
        name: impl Into<String>,
        index: usize,
        source: impl Into<BoxedStageError>,
        last_good: RubixData,
    ) -> Self {
        Self {
            locator: StageLocator::Stage {
                name: name.into(),
                index,
            },
            source: source.into(),
            last_good: Box::new(last_good),
        }
    }

    /// Creates an error for a fused sequence.
    #[must_use]
    pub fn in_sequence(
        fingerprint: impl Into<String>,
        stage_count: usize,
        source: impl Into<BoxedStageError>,
        last_good: RubixData,
    ) -> Self {
        Self {
            locator: StageLocator::Sequence {
                fingerprint: fingerprint.into(),
                stage_count,
            },
            source: source.into(),
            last_good: Box::new(last_good),
        }
    }

    /// The failing stage's name, when known.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match &self.locator {
            StageLocator::Stage { name, .. } => Some(name),
            StageLocator::Sequence { .. } => None,
        }
    }

    /// The failing stage's 1-based position, when known.
    #[must_use]
    pub fn ordinal(&self) -> Option<usize> {
        match &self.locator {
            StageLocator::Stage { index, .. } => Some(index + 1),
            StageLocator::Sequence { .. } => None,
        }
    }

    /// The context as it was before the failing stage (or sequence) ran.
    #[must_use]
    pub fn last_good(&self) -> &RubixData {
        &self.last_good
    }

    /// Consumes the error, returning the last good context.
    #[must_use]
    pub fn into_last_good(self) -> RubixData {
        *self.last_good
    }
}

/// The kind of contract a stage broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// An attribute the stage reads is absent from its input.
    MissingInput,
    /// An attribute the stage declared as written is absent from its output.
    MissingOutput,
    /// The stage added or removed a category sub-record.
    CategorySetChanged,
    /// The stage resized a particle category.
    ParticleCountChanged,
    /// The stage modified an attribute it did not declare as written.
    UndeclaredWrite,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput => write!(f, "missing input"),
            Self::MissingOutput => write!(f, "missing output"),
            Self::CategorySetChanged => write!(f, "category set changed"),
            Self::ParticleCountChanged => write!(f, "particle count changed"),
            Self::UndeclaredWrite => write!(f, "undeclared write"),
        }
    }
}

/// Error raised when a context breaks a declared attribute contract.
///
/// Only the unfused pipeline detects these.
#[derive(Debug, Clone, Error)]
#[error("Contract violation ({kind}) at stage '{stage}' (#{}): {detail}", .index + 1)]
pub struct ContractViolationError {
    /// The stage whose contract is broken.
    pub stage: String,
    /// Zero-based position of that stage.
    pub index: usize,
    /// The kind of violation.
    pub kind: ViolationKind,
    /// The attribute involved, if any.
    pub attribute: Option<AttributeRef>,
    /// The stage that produced the offending context; `None` for the run input.
    pub producer: Option<String>,
    /// Human readable detail.
    pub detail: String,
}

impl ContractViolationError {
    /// Creates a new contract violation.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        index: usize,
        kind: ViolationKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            index,
            kind,
            attribute: None,
            producer: None,
            detail: detail.into(),
        }
    }

    /// Sets the attribute involved.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeRef) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Sets the producing stage.
    #[must_use]
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }
}

/// Provides default suggestions for configuration error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONFIG-001-EMPTY" => Some("Add at least one stage before registering the sequence."),
            "CONFIG-002-DUPLICATE" => Some(
                "Stage names identify stages in errors and descriptions; \
                 give every stage in a sequence a distinct name.",
            ),
            "CONFIG-003-MISSING_KEY" => Some(
                "Add the key to the configuration; nested keys are addressed with '/'.",
            ),
            "CONFIG-004-INVALID_VALUE" => Some(
                "Check the value's type and that it is one of the accepted options.",
            ),
            "CONFIG-005-INVALID_NAME" => Some(
                "Stage names start with a letter or underscore and contain only \
                 letters, digits, '_', '-' or '.'.",
            ),
            "CONFIG-006-UNKNOWN_STAGE" => {
                Some("Register a factory for the stage or fix the name in the pipeline config.")
            }
            "CONFIG-007-MISSING_CATEGORY" => Some(
                "Add a stage that reads or writes the category, or drop it from the \
                 required categories.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Category;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_error_info_picks_up_suggestion() {
        let info = ErrorInfo::new("CONFIG-001-EMPTY", "empty");
        assert!(info.fix_hint.is_some());
        assert_eq!(info.to_json()["code"], "CONFIG-001-EMPTY");
    }

    #[test]
    fn test_missing_key_error() {
        let err = ConfigurationError::missing_key("galaxy/rotation");
        assert_eq!(err.key.as_deref(), Some("galaxy/rotation"));
        assert_eq!(err.code(), Some("CONFIG-003-MISSING_KEY"));
        assert!(err.to_string().contains("galaxy/rotation"));
    }

    #[test]
    fn test_duplicate_stage_error() {
        let err = ConfigurationError::duplicate_stage("rotate", 0, 2);
        assert_eq!(err.stage.as_deref(), Some("rotate"));
        assert_eq!(err.code(), Some("CONFIG-002-DUPLICATE"));
    }

    #[test]
    fn test_in_stage_keeps_existing() {
        let err = ConfigurationError::unknown_stage("a").in_stage("b");
        assert_eq!(err.stage.as_deref(), Some("a"));
        let err = ConfigurationError::missing_key("k").in_stage("b");
        assert_eq!(err.stage.as_deref(), Some("b"));
    }

    #[test]
    fn test_stage_execution_error_locator() {
        let err = StageExecutionError::at_stage(
            "double",
            0,
            anyhow::anyhow!("boom"),
            RubixData::new(),
        );
        assert_eq!(err.stage_name(), Some("double"));
        assert_eq!(err.ordinal(), Some(1));
        assert!(err.to_string().contains("stage 'double' (#1)"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_sequence_locator_display() {
        let err = StageExecutionError::in_sequence(
            "0123456789abcdef",
            3,
            anyhow::anyhow!("boom"),
            RubixData::new(),
        );
        assert_eq!(err.stage_name(), None);
        assert!(err.to_string().contains("0123456789ab (3 stages)"));
    }

    #[test]
    fn test_contract_violation_display() {
        let err = ContractViolationError::new("bin", 1, ViolationKind::MissingInput, "absent")
            .with_attribute(AttributeRef::new(Category::Stars, "coords"))
            .with_producer("rotate");
        let text = err.to_string();
        assert!(text.contains("missing input"));
        assert!(text.contains("#2"));
        assert_eq!(err.producer.as_deref(), Some("rotate"));
    }

    #[test]
    fn test_error_suggestions() {
        assert!(ErrorSuggestions::get("CONFIG-002-DUPLICATE").is_some());
        assert!(ErrorSuggestions::get("UNKNOWN").is_none());
    }
}
