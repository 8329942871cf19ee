//! The contract every pipeline implementation satisfies.

use crate::context::RubixData;
use crate::errors::{ConfigurationError, RubixError};
use crate::transformer::{BoundStage, PipelineExpression};

/// Register stages in order, run them over a context, describe them.
///
/// No stage is retried or skipped: a run halts at the first failure, and
/// every stage executes at most once per run.
pub trait AbstractPipeline: Send + Sync {
    /// Replaces the registered sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `stages` is empty or two stages
    /// share a name. The previous sequence is kept on error.
    fn register(&mut self, stages: Vec<BoundStage>) -> Result<(), ConfigurationError>;

    /// Runs the registered stages over `ctx` and returns the final context.
    ///
    /// # Errors
    ///
    /// Returns a [`RubixError::StageExecution`] naming the failing stage and
    /// carrying the context from before it ran, a
    /// [`RubixError::ContractViolation`] when inter-stage checks are enabled
    /// and fail, or a [`RubixError::Configuration`] when nothing is
    /// registered.
    fn run(&self, ctx: RubixData) -> Result<RubixData, RubixError>;

    /// The expression form of the registered sequence. Never runs a stage.
    fn describe(&self) -> PipelineExpression;
}
