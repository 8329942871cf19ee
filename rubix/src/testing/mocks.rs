//! Mock stages and emitters for testing.

use crate::config::PipelineConfig;
use crate::context::{Category, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::{StageScope, TracingEmitter};
use crate::stages::{stateless, AttributeAccess, Binding, StageFactory, Transform};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn x_access() -> AttributeAccess {
    AttributeAccess::new()
        .reads(Category::Galaxy, "x")
        .writes(Category::Galaxy, "x")
}

fn read_x(ctx: &RubixData) -> anyhow::Result<f64> {
    ctx.scalar(Category::Galaxy, "x")
        .ok_or_else(|| anyhow::anyhow!("galaxy/x is missing"))
}

/// `x -> 2x`.
#[must_use]
pub fn double() -> impl StageFactory {
    stateless("double", x_access(), |ctx: &RubixData, _: &StageScope<'_>| {
        let x = read_x(ctx)?;
        Ok(ctx.clone().with_galaxy_scalar("x", x * 2.0))
    })
}

/// `x -> x + 1`.
#[must_use]
pub fn increment() -> impl StageFactory {
    stateless("increment", x_access(), |ctx: &RubixData, _: &StageScope<'_>| {
        let x = read_x(ctx)?;
        Ok(ctx.clone().with_galaxy_scalar("x", x + 1.0))
    })
}

/// Passes the context through unchanged unless `x` is negative.
#[must_use]
pub fn fail_if_negative() -> impl StageFactory {
    let access = AttributeAccess::new().reads(Category::Galaxy, "x");
    stateless("fail_if_negative", access, |ctx: &RubixData, _: &StageScope<'_>| {
        let x = read_x(ctx)?;
        if x < 0.0 {
            anyhow::bail!("x must be non-negative, got {x}");
        }
        Ok(ctx.clone())
    })
}

/// A pass-through stage that counts its invocations.
#[derive(Debug, Clone)]
pub struct CountingStage {
    name: String,
    calls: Arc<AtomicUsize>,
}

impl CountingStage {
    /// Creates a new counting stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of invocations across every binding of this factory.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct CountingTransform {
    calls: Arc<AtomicUsize>,
}

impl Transform for CountingTransform {
    fn apply(&self, ctx: &RubixData, _scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.clone())
    }

    fn apply_in_place(&self, _ctx: &mut RubixData, _scope: &StageScope<'_>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl StageFactory for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&self, _config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        Ok(Binding::new(Arc::new(CountingTransform {
            calls: Arc::clone(&self.calls),
        })))
    }
}

/// The kind of a recorded span event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// `span_start`.
    Start,
    /// `span_end`.
    End,
    /// `span_error`.
    Error,
}

/// One recorded span event.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    /// The event kind.
    pub kind: SpanKind,
    /// The span name.
    pub name: String,
    /// The error message, for error events.
    pub error: Option<String>,
    /// The span attributes.
    pub attributes: BTreeMap<String, String>,
}

/// A tracing emitter that records every event.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<RecordedSpan>>,
}

impl RecordingEmitter {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event, in order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedSpan> {
        self.events.lock().clone()
    }

    /// Names of the spans that emitted an event of `kind`, in order.
    #[must_use]
    pub fn names(&self, kind: SpanKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Clears recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(
        &self,
        kind: SpanKind,
        name: &str,
        error: Option<&str>,
        attributes: &BTreeMap<String, String>,
    ) {
        self.events.lock().push(RecordedSpan {
            kind,
            name: name.to_string(),
            error: error.map(str::to_string),
            attributes: attributes.clone(),
        });
    }
}

impl TracingEmitter for RecordingEmitter {
    fn span_start(&self, name: &str, attributes: &BTreeMap<String, String>) {
        self.record(SpanKind::Start, name, None, attributes);
    }

    fn span_end(&self, name: &str, _duration_ms: f64, attributes: &BTreeMap<String, String>) {
        self.record(SpanKind::End, name, None, attributes);
    }

    fn span_error(&self, name: &str, error: &str, attributes: &BTreeMap<String, String>) {
        self.record(SpanKind::Error, name, Some(error), attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bind, x_context};

    #[test]
    fn test_mock_factories() {
        let double = bind(&double());
        let increment = bind(&increment());
        let out = increment.call(&double.call(&x_context(3.0)).unwrap()).unwrap();
        assert_eq!(out, x_context(7.0));
        assert!(bind(&fail_if_negative()).call(&x_context(-1.0)).is_err());
    }

    #[test]
    fn test_counting_stage_shares_counter() {
        let factory = CountingStage::new("count");
        let a = bind(&factory);
        let b = bind(&factory);
        a.call(&x_context(0.0)).unwrap();
        b.call(&x_context(0.0)).unwrap();
        assert_eq!(factory.calls(), 2);
    }

    #[test]
    fn test_recording_emitter() {
        let emitter = RecordingEmitter::new();
        emitter.span_start("a", &BTreeMap::new());
        emitter.span_error("a", "boom", &BTreeMap::new());
        assert_eq!(emitter.names(SpanKind::Start), vec!["a"]);
        assert_eq!(emitter.events()[1].error.as_deref(), Some("boom"));
        emitter.clear();
        assert!(emitter.events().is_empty());
    }
}
