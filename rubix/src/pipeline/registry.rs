//! Name-to-factory registry and config-driven pipeline assembly.

use super::LinearTransformerPipeline;
use crate::config::PipelineConfig;
use crate::errors::ConfigurationError;
use crate::stages::kernels::builtin_factories;
use crate::stages::StageFactory;
use crate::transformer::{bound_transformer, BoundStage};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registry of stage factories, keyed by stage name.
#[derive(Default)]
pub struct StageRegistry {
    factories: RwLock<HashMap<String, Arc<dyn StageFactory>>>,
}

impl StageRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in factory.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for factory in builtin_factories() {
            registry.register(factory);
        }
        registry
    }

    /// Registers a factory under its own name, replacing any previous one.
    pub fn register(&self, factory: Arc<dyn StageFactory>) {
        let name = factory.name().to_string();
        if self.factories.write().insert(name.clone(), factory).is_some() {
            ::tracing::debug!(stage = %name, "Replaced stage factory");
        }
    }

    /// Gets a factory by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn StageFactory>> {
        self.factories.read().get(name).cloned()
    }

    /// Checks if a factory is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Binds the factory registered as `name` against `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is registered as `name` or it rejects
    /// `config`.
    pub fn bind(&self, name: &str, config: &PipelineConfig) -> Result<BoundStage, ConfigurationError> {
        let factory = self
            .get(name)
            .ok_or_else(|| ConfigurationError::unknown_stage(name))?;
        bound_transformer(factory.as_ref(), config)
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

/// Builds the pipeline named `name` from `pipelines/<name>/stages` in
/// `config`, binding each listed stage from `registry` in order.
///
/// # Errors
///
/// Returns an error if the stage list is missing or empty, names an unknown
/// stage, lists a stage twice, or a factory rejects `config`.
pub fn build_pipeline(
    registry: &StageRegistry,
    config: &PipelineConfig,
    name: &str,
) -> Result<LinearTransformerPipeline, ConfigurationError> {
    let path = format!("pipelines/{name}/stages");
    let names = config.str_list(&path)?;

    let stages = names
        .iter()
        .map(|stage| registry.bind(stage, config))
        .collect::<Result<Vec<_>, _>>()?;

    ::tracing::info!(pipeline = name, stages = ?names, "Assembled pipeline from config");
    LinearTransformerPipeline::with_stages(name, stages)
}
