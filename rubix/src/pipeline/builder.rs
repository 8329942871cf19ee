//! Pipeline builder with bind-time validation.

use super::{AbstractPipeline, LinearTransformerPipeline};
use crate::config::{EngineSettings, PipelineConfig};
use crate::context::Category;
use crate::errors::{ConfigurationError, ErrorInfo};
use crate::observability::TracingEmitter;
use crate::stages::StageFactory;
use crate::transformer::{bound_transformer, BoundStage, ToExpression};
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated linear pipelines.
///
/// Every stage is bound against the builder's configuration as soon as it is
/// added, so a bad configuration key surfaces at the `stage` call that needs
/// it.
#[derive(Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Configuration bound into each stage.
    config: PipelineConfig,
    /// Bound stages in insertion order.
    stages: Vec<BoundStage>,
    settings: EngineSettings,
    emitter: Option<Arc<dyn TracingEmitter>>,
    required: Vec<Category>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            stages: Vec::new(),
            settings: EngineSettings::default(),
            emitter: None,
            required: Vec::new(),
        }
    }

    /// Binds `factory` and appends the resulting stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory rejects the configuration or a stage
    /// of the same name was already added.
    pub fn stage(mut self, factory: &dyn StageFactory) -> Result<Self, ConfigurationError> {
        let stage = bound_transformer(factory, &self.config)?;
        self.push(stage)?;
        Ok(self)
    }

    /// Appends an already bound stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage of the same name was already added.
    pub fn bound(mut self, stage: BoundStage) -> Result<Self, ConfigurationError> {
        self.push(stage)?;
        Ok(self)
    }

    /// Sets the engine settings of the built pipeline.
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the emitter of the built pipeline.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn TracingEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Requires that some stage reads or writes each of `categories`.
    #[must_use]
    pub fn require_categories(mut self, categories: &[Category]) -> Self {
        for category in categories {
            if !self.required.contains(category) {
                self.required.push(*category);
            }
        }
        self
    }

    /// Appends the stages of `other` after this builder's stages.
    ///
    /// # Errors
    ///
    /// Returns an error if both builders hold a stage of the same name.
    pub fn compose(mut self, other: Self) -> Result<Self, ConfigurationError> {
        self.name = format!("{}+{}", self.name, other.name);
        for stage in other.stages {
            self.push(stage)?;
        }
        for category in other.required {
            if !self.required.contains(&category) {
                self.required.push(category);
            }
        }
        Ok(self)
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages or a required category
    /// is never referenced.
    pub fn build(self) -> Result<LinearTransformerPipeline, ConfigurationError> {
        if self.stages.is_empty() {
            return Err(ConfigurationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            ))
            .with_error_info(
                ErrorInfo::new("CONFIG-001-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Add at least one stage to the pipeline before building."),
            ));
        }

        self.stages
            .to_expression()
            .require_categories(&self.required)?;

        let mut pipeline = LinearTransformerPipeline::new(self.name).with_settings(self.settings);
        if let Some(emitter) = self.emitter {
            pipeline = pipeline.with_emitter(emitter);
        }
        pipeline.register(self.stages)?;
        Ok(pipeline)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn push(&mut self, stage: BoundStage) -> Result<(), ConfigurationError> {
        if let Some(first) = self.stages.iter().position(|s| s.name() == stage.name()) {
            return Err(ConfigurationError::duplicate_stage(
                stage.name(),
                first,
                self.stages.len(),
            ));
        }
        self.stages.push(stage);
        Ok(())
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages.to_expression().stage_names())
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}
