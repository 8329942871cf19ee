//! Observability utilities.
//!
//! Logging goes through `tracing`. Pipelines take an explicit
//! [`TracingEmitter`] handle at construction and open a [`RunScope`] per run.

mod scope;
mod subscriber;
mod tracing;

pub use scope::{RunReport, RunScope, StageScope, StageTiming};
pub use subscriber::init_logging;
#[cfg(test)]
pub use tracing::MockTracingEmitter;
pub use tracing::{
    LoggingTracingEmitter, NoOpTracingEmitter, PipelineSpanAttributes, SpanTimer,
    StageSpanAttributes, TracingEmitter,
};
