//! Strictly sequential pipeline.

use super::contracts::{check_inputs, check_outputs};
use super::AbstractPipeline;
use crate::config::EngineSettings;
use crate::context::RubixData;
use crate::errors::{ConfigurationError, RubixError, StageExecutionError};
use crate::observability::{
    LoggingTracingEmitter, RunReport, RunScope, SpanTimer, StageTiming, TracingEmitter,
};
use crate::transformer::{
    BoundStage, CompiledTransformer, PipelineExpression, ToExpression,
};
use crate::utils::find_duplicate;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Runs registered stages one after another; stage `i + 1` receives exactly
/// the context stage `i` returned.
///
/// Constructed only with a non-empty sequence, through
/// [`with_stages`](Self::with_stages) or the builder, and
/// [`register`](AbstractPipeline::register) never leaves it empty.
pub struct LinearTransformerPipeline {
    name: String,
    settings: EngineSettings,
    emitter: Arc<dyn TracingEmitter>,
    stages: Vec<BoundStage>,
    compiled: RwLock<Option<Arc<CompiledTransformer>>>,
}

impl LinearTransformerPipeline {
    /// Creates a pipeline with no stages; callers register before exposing it.
    #[must_use]
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: EngineSettings::default(),
            emitter: Arc::new(LoggingTracingEmitter),
            stages: Vec::new(),
            compiled: RwLock::new(None),
        }
    }

    /// Creates a pipeline and registers `stages`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `stages` is empty or has a
    /// duplicate name.
    pub fn with_stages(
        name: impl Into<String>,
        stages: Vec<BoundStage>,
    ) -> Result<Self, ConfigurationError> {
        let mut pipeline = Self::new(name);
        pipeline.register(stages)?;
        Ok(pipeline)
    }

    /// Sets the engine settings.
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        *self.compiled.get_mut() = None;
        self
    }

    /// Sets the emitter for run events.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn TracingEmitter>) -> Self {
        self.emitter = emitter;
        *self.compiled.get_mut() = None;
        self
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The registered stages, in order.
    #[must_use]
    pub fn stages(&self) -> &[BoundStage] {
        &self.stages
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs the pipeline and reports per-stage timings.
    ///
    /// # Errors
    ///
    /// See [`AbstractPipeline::run`].
    pub fn run_with_report(&self, ctx: RubixData) -> Result<(RubixData, RunReport), RubixError> {
        let run = RunScope::open(
            &self.name,
            "linear",
            self.stages.len(),
            Arc::clone(&self.emitter),
        );
        let _entered = run.span().enter();
        let mut report = RunReport::for_run(&run);

        match self.execute(ctx, &run, &mut report) {
            Ok(out) => {
                report.duration_ms = run.finish();
                ::tracing::info!(
                    pipeline = %self.name,
                    run_id = %run.run_id(),
                    stages = self.stages.len(),
                    duration_ms = report.duration_ms,
                    "Pipeline run completed"
                );
                Ok((out, report))
            }
            Err(err) => {
                run.fail(&err.to_string());
                ::tracing::error!(
                    pipeline = %self.name,
                    run_id = %run.run_id(),
                    error = %err,
                    "Pipeline run failed"
                );
                Err(err)
            }
        }
    }

    /// The fused form of the registered sequence, built on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the sequence cannot be fused.
    pub fn compiled(&self) -> Result<Arc<CompiledTransformer>, ConfigurationError> {
        if let Some(compiled) = self.compiled.read().as_ref() {
            return Ok(Arc::clone(compiled));
        }

        let mut slot = self.compiled.write();
        if let Some(compiled) = slot.as_ref() {
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(
            CompiledTransformer::new(self.stages.clone())?
                .with_name(&self.name)
                .with_cache_capacity(self.settings.compiled_cache_capacity)
                .with_emitter(Arc::clone(&self.emitter)),
        );
        *slot = Some(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Runs the fused form over `ctx`.
    ///
    /// # Errors
    ///
    /// Returns a [`RubixError::StageExecution`] located at the sequence.
    pub fn run_compiled(&self, ctx: &RubixData) -> Result<RubixData, RubixError> {
        Ok(self.compiled()?.call(ctx)?)
    }

    fn execute(
        &self,
        ctx: RubixData,
        run: &RunScope,
        report: &mut RunReport,
    ) -> Result<RubixData, RubixError> {
        let validate = self.settings.validate_contracts;
        let mut current = ctx;

        for (index, stage) in self.stages.iter().enumerate() {
            if validate {
                let producer = index.checked_sub(1).map(|i| self.stages[i].name());
                check_inputs(stage, index, &current, producer)?;
            }

            let scope = run.stage(stage.name(), index);
            scope.started();
            let timer = SpanTimer::start(stage.name());

            let next = match stage.apply(&current, &scope) {
                Ok(next) => next,
                Err(err) => {
                    let message = format!("{err:#}");
                    scope.failed(&message, timer.finish());
                    ::tracing::warn!(
                        stage = stage.name(),
                        index,
                        error = %message,
                        "Stage failed"
                    );
                    return Err(StageExecutionError::at_stage(stage.name(), index, err, current).into());
                }
            };
            let duration_ms = timer.finish();

            if validate {
                check_outputs(stage, index, &current, &next, self.settings.strict_ownership)?;
            }

            scope.completed(duration_ms);
            report.stages.push(StageTiming {
                name: stage.name().to_string(),
                index,
                duration_ms,
            });
            current = next;
        }

        Ok(current)
    }
}

impl AbstractPipeline for LinearTransformerPipeline {
    fn register(&mut self, stages: Vec<BoundStage>) -> Result<(), ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::empty_sequence());
        }
        let names: Vec<&str> = stages.iter().map(BoundStage::name).collect();
        if let Some(dup) = find_duplicate(&names) {
            return Err(ConfigurationError::duplicate_stage(dup.name, dup.first, dup.second));
        }

        ::tracing::debug!(
            pipeline = %self.name,
            stages = ?names,
            "Registered stage sequence"
        );
        self.stages = stages;
        *self.compiled.get_mut() = None;
        Ok(())
    }

    fn run(&self, ctx: RubixData) -> Result<RubixData, RubixError> {
        self.run_with_report(ctx).map(|(out, _)| out)
    }

    fn describe(&self) -> PipelineExpression {
        self.stages.to_expression()
    }
}

impl ToExpression for LinearTransformerPipeline {
    fn to_expression(&self) -> PipelineExpression {
        self.describe()
    }
}

impl fmt::Debug for LinearTransformerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearTransformerPipeline")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("stages", &self.describe().stage_names())
            .field("compiled", &self.compiled.read().is_some())
            .finish_non_exhaustive()
    }
}
