//! Run-scoped logging handles.
//!
//! A [`RunScope`] lives for exactly one pipeline invocation. Stages never
//! reach for a global logger; they receive a [`StageScope`] borrowed from the
//! run they are part of.

use super::{PipelineSpanAttributes, StageSpanAttributes, TracingEmitter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Logging state for one pipeline invocation.
pub struct RunScope {
    run_id: Uuid,
    pipeline: String,
    mode: &'static str,
    started_at: DateTime<Utc>,
    started: Instant,
    emitter: Arc<dyn TracingEmitter>,
    span: ::tracing::Span,
}

impl RunScope {
    /// Opens a new run scope and emits the run's start event.
    #[must_use]
    pub fn open(
        pipeline: impl Into<String>,
        mode: &'static str,
        stage_count: usize,
        emitter: Arc<dyn TracingEmitter>,
    ) -> Self {
        let pipeline = pipeline.into();
        let run_id = Uuid::new_v4();
        let span = ::tracing::info_span!(
            "pipeline_run",
            pipeline = %pipeline,
            run_id = %run_id,
            mode,
        );
        let scope = Self {
            run_id,
            pipeline,
            mode,
            started_at: Utc::now(),
            started: Instant::now(),
            emitter,
            span,
        };
        let attrs = scope.attributes().with_stage_count(stage_count);
        scope
            .emitter
            .span_start(&scope.pipeline, &attrs.to_attributes());
        scope
    }

    /// The run's unique ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds since the run started.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// The tracing span covering the run.
    #[must_use]
    pub fn span(&self) -> &::tracing::Span {
        &self.span
    }

    /// The emitter for this run.
    #[must_use]
    pub fn emitter(&self) -> &dyn TracingEmitter {
        self.emitter.as_ref()
    }

    /// Creates the scope handed to one stage.
    #[must_use]
    pub fn stage(&self, name: &str, index: usize) -> StageScope<'_> {
        let span = ::tracing::debug_span!(parent: &self.span, "stage", stage = name, index);
        StageScope {
            run: self,
            name: name.to_string(),
            index,
            span,
        }
    }

    /// Closes the run successfully.
    pub fn finish(&self) -> f64 {
        let duration_ms = self.elapsed_ms();
        self.emitter
            .span_end(&self.pipeline, duration_ms, &self.attributes().to_attributes());
        duration_ms
    }

    /// Closes the run with an error.
    pub fn fail(&self, error: &str) {
        self.emitter
            .span_error(&self.pipeline, error, &self.attributes().to_attributes());
    }

    fn attributes(&self) -> PipelineSpanAttributes {
        PipelineSpanAttributes::new()
            .with_pipeline_name(&self.pipeline)
            .with_run_id(self.run_id.to_string())
            .with_execution_mode(self.mode)
    }
}

impl fmt::Debug for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunScope")
            .field("run_id", &self.run_id)
            .field("pipeline", &self.pipeline)
            .field("mode", &self.mode)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Logging handle for one stage invocation within a run.
#[derive(Debug)]
pub struct StageScope<'run> {
    run: &'run RunScope,
    name: String,
    index: usize,
    span: ::tracing::Span,
}

impl StageScope<'_> {
    /// The stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.name
    }

    /// Zero-based position of the stage.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The ID of the run this stage belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run.run_id
    }

    /// The tracing span covering this stage.
    #[must_use]
    pub fn span(&self) -> &::tracing::Span {
        &self.span
    }

    /// Logs a debug message in the stage span.
    pub fn debug(&self, message: &str) {
        ::tracing::debug!(parent: &self.span, stage = %self.name, "{message}");
    }

    /// Logs an info message in the stage span.
    pub fn info(&self, message: &str) {
        ::tracing::info!(parent: &self.span, stage = %self.name, "{message}");
    }

    /// Logs a warning in the stage span.
    pub fn warn(&self, message: &str) {
        ::tracing::warn!(parent: &self.span, stage = %self.name, "{message}");
    }

    pub(crate) fn started(&self) {
        self.run.emitter.span_start(
            &self.name,
            &StageSpanAttributes::new(&self.name, self.index).to_attributes(),
        );
    }

    pub(crate) fn completed(&self, duration_ms: f64) {
        let attrs = StageSpanAttributes::new(&self.name, self.index)
            .with_status("completed")
            .with_duration_ms(duration_ms);
        self.run
            .emitter
            .span_end(&self.name, duration_ms, &attrs.to_attributes());
    }

    pub(crate) fn failed(&self, error: &str, duration_ms: f64) {
        let attrs = StageSpanAttributes::new(&self.name, self.index)
            .with_status("failed")
            .with_duration_ms(duration_ms)
            .with_error(error);
        self.run
            .emitter
            .span_error(&self.name, error, &attrs.to_attributes());
    }
}

/// Timing of one stage within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage name.
    pub name: String,
    /// Zero-based position.
    pub index: usize,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run's unique ID.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total duration in milliseconds.
    pub duration_ms: f64,
    /// Per-stage timings, in execution order.
    pub stages: Vec<StageTiming>,
}

impl RunReport {
    /// Starts a report for a run scope.
    #[must_use]
    pub fn for_run(scope: &RunScope) -> Self {
        Self {
            run_id: scope.run_id(),
            pipeline: scope.pipeline().to_string(),
            started_at: scope.started_at(),
            duration_ms: 0.0,
            stages: Vec::new(),
        }
    }

    /// Names of the stages that ran, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}
