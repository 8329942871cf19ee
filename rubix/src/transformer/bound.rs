//! Stages with configuration already bound.

use super::ExpressionNode;
use crate::config::PipelineConfig;
use crate::context::RubixData;
use crate::errors::{ConfigurationError, StageExecutionError};
use crate::observability::{LoggingTracingEmitter, RunScope, SpanTimer, StageScope};
use crate::stages::{AttributeAccess, Binding, StageFactory, Transform};
use crate::utils::validate_stage_name;
use std::fmt;
use std::sync::Arc;

/// A named stage holding its validated configuration and its transform.
///
/// Immutable once constructed. Cloning shares the transform.
#[derive(Clone)]
pub struct BoundStage {
    name: String,
    snapshot: serde_json::Value,
    access: AttributeAccess,
    transform: Arc<dyn Transform>,
}

impl BoundStage {
    /// Creates a stage from a binding.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid stage name.
    pub fn new(name: impl Into<String>, binding: Binding) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if let Err(e) = validate_stage_name(&name) {
            ::tracing::debug!(stage = %name, reason = %e.reason, "Rejected stage name");
            return Err(ConfigurationError::invalid_name(name));
        }
        Ok(Self {
            name,
            snapshot: binding.snapshot,
            access: binding.access,
            transform: binding.transform,
        })
    }

    /// Returns the same stage under another name.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid stage name.
    pub fn renamed(self, name: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(
            name,
            Binding::new(self.transform)
                .with_snapshot(self.snapshot)
                .with_access(self.access),
        )
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the bound configuration.
    #[must_use]
    pub fn snapshot(&self) -> &serde_json::Value {
        &self.snapshot
    }

    /// Declared attribute access.
    #[must_use]
    pub fn access(&self) -> &AttributeAccess {
        &self.access
    }

    /// The bound transform.
    #[must_use]
    pub fn transform(&self) -> &Arc<dyn Transform> {
        &self.transform
    }

    /// Runs the stage on its own, outside any pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`StageExecutionError`] at position 0 carrying `ctx`.
    pub fn call(&self, ctx: &RubixData) -> Result<RubixData, StageExecutionError> {
        let run = RunScope::open(&self.name, "bound", 1, Arc::new(LoggingTracingEmitter));
        let scope = run.stage(&self.name, 0);
        let timer = SpanTimer::start(&self.name);
        match self.apply(ctx, &scope) {
            Ok(out) => {
                scope.completed(timer.finish());
                run.finish();
                Ok(out)
            }
            Err(err) => {
                let message = format!("{err:#}");
                scope.failed(&message, timer.finish());
                run.fail(&message);
                Err(StageExecutionError::at_stage(&self.name, 0, err, ctx.clone()))
            }
        }
    }

    pub(crate) fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        self.transform.apply(ctx, scope)
    }

    pub(crate) fn node(&self, position: usize) -> ExpressionNode {
        ExpressionNode {
            name: self.name.clone(),
            position,
            config: self.snapshot.clone(),
            access: self.access.clone(),
        }
    }
}

impl fmt::Debug for BoundStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundStage")
            .field("name", &self.name)
            .field("snapshot", &self.snapshot)
            .field("transform", &self.transform)
            .finish_non_exhaustive()
    }
}

/// Binds `config` into the stage produced by `factory`.
///
/// Configuration is validated here, once; the returned stage never reports
/// configuration errors at run time.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the factory rejects `config` or its
/// name is invalid.
pub fn bound_transformer<F>(factory: &F, config: &PipelineConfig) -> Result<BoundStage, ConfigurationError>
where
    F: StageFactory + ?Sized,
{
    let name = factory.name();
    let binding = factory.bind(config).map_err(|e| e.in_stage(name))?;
    let stage = BoundStage::new(name, binding)?;
    ::tracing::debug!(stage = name, config = %stage.snapshot, "Bound stage");
    Ok(stage)
}
