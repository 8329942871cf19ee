//! Span attributes, timers and emitters for pipeline runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Span attributes for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpanAttributes {
    /// Pipeline name.
    pub pipeline_name: Option<String>,
    /// Run ID.
    pub run_id: Option<String>,
    /// Execution mode ("linear" or "compiled").
    pub execution_mode: Option<String>,
    /// Number of stages in the sequence.
    pub stage_count: Option<usize>,
}

impl PipelineSpanAttributes {
    /// Creates new pipeline span attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = Some(name.into());
        self
    }

    /// Sets the run ID.
    #[must_use]
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: impl Into<String>) -> Self {
        self.execution_mode = Some(mode.into());
        self
    }

    /// Sets the stage count.
    #[must_use]
    pub fn with_stage_count(mut self, count: usize) -> Self {
        self.stage_count = Some(count);
        self
    }

    /// Flattens to dotted key/value pairs.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();

        if let Some(ref v) = self.pipeline_name {
            attrs.insert("pipeline.name".to_string(), v.clone());
        }
        if let Some(ref v) = self.run_id {
            attrs.insert("pipeline.run_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.execution_mode {
            attrs.insert("pipeline.execution_mode".to_string(), v.clone());
        }
        if let Some(v) = self.stage_count {
            attrs.insert("pipeline.stage_count".to_string(), v.to_string());
        }

        attrs
    }
}

/// Span attributes for one stage invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// Stage name.
    pub stage_name: String,
    /// Zero-based position in the sequence.
    pub index: usize,
    /// Stage status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl StageSpanAttributes {
    /// Creates new stage span attributes.
    #[must_use]
    pub fn new(stage_name: impl Into<String>, index: usize) -> Self {
        Self {
            stage_name: stage_name.into(),
            index,
            ..Default::default()
        }
    }

    /// Sets the stage status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flattens to dotted key/value pairs.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();

        attrs.insert("stage.name".to_string(), self.stage_name.clone());
        attrs.insert("stage.index".to_string(), self.index.to_string());

        if let Some(ref v) = self.status {
            attrs.insert("stage.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("stage.duration_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.error {
            attrs.insert("stage.error".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// Receives span events from pipeline runs.
///
/// An emitter is handed to a pipeline at construction; every run scopes its
/// events with the run's own attributes.
#[cfg_attr(test, mockall::automock)]
pub trait TracingEmitter: Send + Sync {
    /// Emits a span start event.
    fn span_start(&self, name: &str, attributes: &BTreeMap<String, String>);

    /// Emits a span end event.
    fn span_end(&self, name: &str, duration_ms: f64, attributes: &BTreeMap<String, String>);

    /// Emits an error event.
    fn span_error(&self, name: &str, error: &str, attributes: &BTreeMap<String, String>);
}

/// No-op tracing emitter.
#[derive(Debug, Clone, Default)]
pub struct NoOpTracingEmitter;

impl TracingEmitter for NoOpTracingEmitter {
    fn span_start(&self, _name: &str, _attributes: &BTreeMap<String, String>) {}
    fn span_end(&self, _name: &str, _duration_ms: f64, _attributes: &BTreeMap<String, String>) {}
    fn span_error(&self, _name: &str, _error: &str, _attributes: &BTreeMap<String, String>) {}
}

/// Logging-based tracing emitter.
#[derive(Debug, Clone, Default)]
pub struct LoggingTracingEmitter;

impl TracingEmitter for LoggingTracingEmitter {
    fn span_start(&self, name: &str, attributes: &BTreeMap<String, String>) {
        tracing::debug!(span_name = name, ?attributes, "Span started");
    }

    fn span_end(&self, name: &str, duration_ms: f64, attributes: &BTreeMap<String, String>) {
        tracing::info!(span_name = name, duration_ms, ?attributes, "Span ended");
    }

    fn span_error(&self, name: &str, error: &str, attributes: &BTreeMap<String, String>) {
        tracing::error!(span_name = name, error, ?attributes, "Span error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_attributes() {
        let attrs = PipelineSpanAttributes::new()
            .with_pipeline_name("calc_ifu")
            .with_run_id("run-123")
            .with_stage_count(4);

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("pipeline.name"), Some(&"calc_ifu".to_string()));
        assert_eq!(flat.get("pipeline.run_id"), Some(&"run-123".to_string()));
        assert_eq!(flat.get("pipeline.stage_count"), Some(&"4".to_string()));
        assert!(!flat.contains_key("pipeline.execution_mode"));
    }

    #[test]
    fn test_stage_span_attributes() {
        let attrs = StageSpanAttributes::new("rotate_galaxy", 0)
            .with_status("completed")
            .with_duration_ms(123.45);

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("stage.name"), Some(&"rotate_galaxy".to_string()));
        assert_eq!(flat.get("stage.index"), Some(&"0".to_string()));
        assert_eq!(flat.get("stage.status"), Some(&"completed".to_string()));
        assert_eq!(flat.get("stage.duration_ms"), Some(&"123.45".to_string()));
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("test_span");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "test_span");
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_noop_emitter() {
        let emitter = NoOpTracingEmitter;
        emitter.span_start("test", &BTreeMap::new());
        emitter.span_end("test", 100.0, &BTreeMap::new());
        emitter.span_error("test", "error", &BTreeMap::new());
    }
}
