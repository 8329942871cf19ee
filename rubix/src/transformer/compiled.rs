//! Fused execution of a stage sequence.
//!
//! Compilation happens in two explicit phases. The build phase traces the
//! sequence over a sample context, asks every transform for a version
//! specialized to the shape it observes, and stores the resulting
//! [`SpecializedPlan`] under the sample's [`ContextShape`]. The invoke phase
//! looks the plan up by the input's shape and runs its kernels over a single
//! working buffer. A shape with no plan triggers a fresh build instead of an
//! error.
//!
//! A specialized kernel only runs on the intermediate shape it was
//! specialized for. Earlier stages may change that shape depending on
//! values rather than on the input shape; the generic transform runs then.
//!
//! The fused form skips inter-stage contract checks and reports failures
//! against the whole sequence rather than the inner stage.

use super::{BoundStage, PipelineExpression, ToExpression};
use crate::context::{ContextShape, RubixData};
use crate::errors::{ConfigurationError, StageExecutionError};
use crate::observability::{LoggingTracingEmitter, RunScope, TracingEmitter};
use crate::stages::Transform;
use crate::utils::{find_duplicate, short_fingerprint};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Default number of shapes a compiled sequence keeps plans for.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// The kernels of a sequence, specialized for one input shape.
pub struct SpecializedPlan {
    shape: ContextShape,
    kernels: Vec<PlanStep>,
    specialized: usize,
}

struct PlanStep {
    name: String,
    kernel: Arc<dyn Transform>,
    /// Shape the kernel was specialized for, and the transform to run
    /// when the working context no longer has it.
    guard: Option<(ContextShape, Arc<dyn Transform>)>,
}

impl PlanStep {
    fn kernel_for(&self, work: &RubixData) -> &Arc<dyn Transform> {
        match &self.guard {
            Some((shape, generic)) if work.shape() != *shape => {
                ::tracing::debug!(
                    stage = %self.name,
                    expected = %shape,
                    "Intermediate shape differs from plan, running generic transform"
                );
                generic
            }
            _ => &self.kernel,
        }
    }
}

impl SpecializedPlan {
    /// The input shape this plan was built for.
    #[must_use]
    pub fn shape(&self) -> &ContextShape {
        &self.shape
    }

    /// Number of kernels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether the plan has no kernels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Number of kernels that were replaced by a specialized version.
    #[must_use]
    pub fn specialized_count(&self) -> usize {
        self.specialized
    }
}

impl fmt::Debug for SpecializedPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializedPlan")
            .field("shape", &self.shape.to_string())
            .field("kernels", &self.kernels.len())
            .field("specialized", &self.specialized)
            .finish()
    }
}

/// A stage sequence fused into one callable.
///
/// Safe to call from many threads at once; each call owns its context and
/// the plan cache only ever grows by complete plans.
pub struct CompiledTransformer {
    name: String,
    stages: Vec<BoundStage>,
    expression: PipelineExpression,
    fingerprint: String,
    cache: DashMap<ContextShape, Arc<SpecializedPlan>>,
    capacity: usize,
    emitter: Arc<dyn TracingEmitter>,
}

impl CompiledTransformer {
    /// Fuses an ordered stage sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the sequence is empty or two
    /// stages share a name.
    pub fn new(stages: Vec<BoundStage>) -> Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::empty_sequence());
        }
        let names: Vec<&str> = stages.iter().map(BoundStage::name).collect();
        if let Some(dup) = find_duplicate(&names) {
            return Err(ConfigurationError::duplicate_stage(dup.name, dup.first, dup.second));
        }

        let expression = stages.to_expression();
        let fingerprint = expression.fingerprint();
        Ok(Self {
            name: "compiled".to_string(),
            stages,
            expression,
            fingerprint,
            cache: DashMap::new(),
            capacity: DEFAULT_CACHE_CAPACITY,
            emitter: Arc::new(LoggingTracingEmitter),
        })
    }

    /// Sets the name used in run events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of shapes kept before the cache is reset.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sets the emitter for run events.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn TracingEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// The fused stages, in order.
    #[must_use]
    pub fn stages(&self) -> &[BoundStage] {
        &self.stages
    }

    /// Number of fused stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Fingerprint of the sequence's expression form.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Number of cached plans.
    #[must_use]
    pub fn cached_plans(&self) -> usize {
        self.cache.len()
    }

    /// Whether a plan exists for `shape`.
    #[must_use]
    pub fn is_specialized_for(&self, shape: &ContextShape) -> bool {
        self.cache.contains_key(shape)
    }

    /// Drops every cached plan.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Build phase: specializes the sequence for inputs shaped like `sample`.
    ///
    /// # Errors
    ///
    /// Returns a [`StageExecutionError`] if a stage fails on the sample.
    pub fn build(&self, sample: &RubixData) -> Result<Arc<SpecializedPlan>, StageExecutionError> {
        let run = self.open_run();
        let _entered = run.span().enter();
        match self.trace(sample, &run) {
            Ok((_, plan)) => {
                run.finish();
                Ok(self.store(plan))
            }
            Err(err) => {
                run.fail(&err.to_string());
                Err(err)
            }
        }
    }

    /// Invoke phase: runs the fused sequence over `ctx`.
    ///
    /// Equivalent to running the stages one after another.
    ///
    /// # Errors
    ///
    /// Returns a [`StageExecutionError`] located at the sequence, carrying
    /// `ctx` as the last good context.
    pub fn call(&self, ctx: &RubixData) -> Result<RubixData, StageExecutionError> {
        let run = self.open_run();
        let _entered = run.span().enter();
        let shape = ctx.shape();
        let cached = self.cache.get(&shape).map(|entry| Arc::clone(entry.value()));

        let result = match cached {
            Some(plan) => self.invoke(&plan, ctx, &run),
            None => {
                ::tracing::info!(
                    fingerprint = short_fingerprint(&self.fingerprint),
                    shape = %shape,
                    "Specializing compiled sequence"
                );
                self.trace(ctx, &run).map(|(out, plan)| {
                    self.store(plan);
                    out
                })
            }
        };

        match &result {
            Ok(_) => {
                run.finish();
            }
            Err(err) => run.fail(&err.to_string()),
        }
        result
    }

    fn open_run(&self) -> RunScope {
        RunScope::open(
            &self.name,
            "compiled",
            self.stages.len(),
            Arc::clone(&self.emitter),
        )
    }

    fn trace(
        &self,
        input: &RubixData,
        run: &RunScope,
    ) -> Result<(RubixData, SpecializedPlan), StageExecutionError> {
        let shape = input.shape();
        let mut work = input.clone();
        let mut kernels = Vec::with_capacity(self.stages.len());
        let mut specialized = 0;

        for (index, stage) in self.stages.iter().enumerate() {
            let scope = run.stage(stage.name(), index);
            let observed = work.shape();
            let step = match stage
                .transform()
                .specialize(&observed)
                .map_err(|e| self.failure(e, input))?
            {
                Some(kernel) => {
                    specialized += 1;
                    PlanStep {
                        name: stage.name().to_string(),
                        kernel,
                        guard: Some((observed, Arc::clone(stage.transform()))),
                    }
                }
                None => PlanStep {
                    name: stage.name().to_string(),
                    kernel: Arc::clone(stage.transform()),
                    guard: None,
                },
            };
            step.kernel
                .apply_in_place(&mut work, &scope)
                .map_err(|e| self.failure(e, input))?;
            kernels.push(step);
        }

        Ok((
            work,
            SpecializedPlan {
                shape,
                kernels,
                specialized,
            },
        ))
    }

    fn invoke(
        &self,
        plan: &SpecializedPlan,
        input: &RubixData,
        run: &RunScope,
    ) -> Result<RubixData, StageExecutionError> {
        let mut work = input.clone();
        for (index, step) in plan.kernels.iter().enumerate() {
            let scope = run.stage(&step.name, index);
            step.kernel_for(&work)
                .apply_in_place(&mut work, &scope)
                .map_err(|e| self.failure(e, input))?;
        }
        Ok(work)
    }

    fn store(&self, plan: SpecializedPlan) -> Arc<SpecializedPlan> {
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&plan.shape) {
            ::tracing::debug!(
                fingerprint = short_fingerprint(&self.fingerprint),
                capacity = self.capacity,
                "Plan cache full, resetting"
            );
            self.cache.clear();
        }
        let plan = Arc::new(plan);
        self.cache.insert(plan.shape.clone(), Arc::clone(&plan));
        plan
    }

    fn failure(&self, error: anyhow::Error, input: &RubixData) -> StageExecutionError {
        ::tracing::error!(
            fingerprint = short_fingerprint(&self.fingerprint),
            error = %format!("{error:#}"),
            "Compiled sequence failed"
        );
        StageExecutionError::in_sequence(
            self.fingerprint.clone(),
            self.stages.len(),
            error,
            input.clone(),
        )
    }
}

impl ToExpression for CompiledTransformer {
    fn to_expression(&self) -> PipelineExpression {
        self.expression.clone()
    }
}

impl fmt::Debug for CompiledTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTransformer")
            .field("name", &self.name)
            .field("stages", &self.expression.stage_names())
            .field("fingerprint", &short_fingerprint(&self.fingerprint))
            .field("cached_plans", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Fuses an ordered sequence of bound stages into one callable.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if the sequence is empty or two stages
/// share a name.
pub fn compiled_transformer(stages: &[BoundStage]) -> Result<CompiledTransformer, ConfigurationError> {
    CompiledTransformer::new(stages.to_vec())
}
