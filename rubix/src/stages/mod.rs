//! Stage contract: transforms and the factories that bind them.
//!
//! A stage factory turns static configuration into a [`Transform`], a pure
//! `RubixData -> RubixData` step. Factories validate configuration once, in
//! [`StageFactory::bind`]; transforms never see configuration errors.

mod access;
pub mod kernels;

pub use access::AttributeAccess;

use crate::config::PipelineConfig;
use crate::context::{ContextShape, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::StageScope;
use std::fmt::Debug;
use std::sync::Arc;

/// A pure transformation of the context.
///
/// Implementations must be deterministic: equal inputs yield equal outputs.
pub trait Transform: Send + Sync + Debug {
    /// Produces the updated context from `ctx`.
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData>;

    /// Updates `ctx` in place.
    ///
    /// Must leave `ctx` equal to what [`apply`](Self::apply) returns. The
    /// default delegates to `apply`; kernels override it to avoid
    /// materializing a second context.
    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        *ctx = self.apply(ctx, scope)?;
        Ok(())
    }

    /// Returns a version of this transform specialized for inputs of `shape`.
    ///
    /// `None` means the transform is used as is.
    fn specialize(&self, _shape: &ContextShape) -> anyhow::Result<Option<Arc<dyn Transform>>> {
        Ok(None)
    }
}

/// The result of binding a factory to configuration.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound transform.
    pub transform: Arc<dyn Transform>,
    /// Snapshot of the configuration the transform closed over.
    pub snapshot: serde_json::Value,
    /// Attributes read and written.
    pub access: AttributeAccess,
}

impl Binding {
    /// Creates a binding with an empty snapshot and no declared access.
    #[must_use]
    pub fn new(transform: Arc<dyn Transform>) -> Self {
        Self {
            transform,
            snapshot: serde_json::Value::Object(serde_json::Map::new()),
            access: AttributeAccess::default(),
        }
    }

    /// Sets the configuration snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Sets the declared attribute access.
    #[must_use]
    pub fn with_access(mut self, access: AttributeAccess) -> Self {
        self.access = access;
        self
    }
}

/// Turns configuration into a bound transform.
pub trait StageFactory: Send + Sync {
    /// The stage name.
    fn name(&self) -> &str;

    /// Validates `config` and closes over it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for missing or invalid keys.
    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError>;
}

/// A closure-based transform.
pub struct FnTransform<F>
where
    F: Fn(&RubixData, &StageScope<'_>) -> anyhow::Result<RubixData> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&RubixData, &StageScope<'_>) -> anyhow::Result<RubixData> + Send + Sync,
{
    /// Creates a new closure-based transform.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnTransform<F>
where
    F: Fn(&RubixData, &StageScope<'_>) -> anyhow::Result<RubixData> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&RubixData, &StageScope<'_>) -> anyhow::Result<RubixData> + Send + Sync,
{
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        (self.func)(ctx, scope)
    }
}

/// A closure-based stage factory.
pub struct FnStageFactory<B>
where
    B: Fn(&PipelineConfig) -> Result<Binding, ConfigurationError> + Send + Sync,
{
    name: String,
    bind: B,
}

impl<B> FnStageFactory<B>
where
    B: Fn(&PipelineConfig) -> Result<Binding, ConfigurationError> + Send + Sync,
{
    /// Creates a factory from a binding closure.
    pub fn new(name: impl Into<String>, bind: B) -> Self {
        Self {
            name: name.into(),
            bind,
        }
    }
}

/// Creates a factory for a transform that needs no configuration.
///
/// Each bind produces a fresh transform wrapping a clone of `func`.
pub fn stateless<F>(
    name: impl Into<String>,
    access: AttributeAccess,
    func: F,
) -> impl StageFactory
where
    F: Fn(&RubixData, &StageScope<'_>) -> anyhow::Result<RubixData> + Clone + Send + Sync + 'static,
{
    let name = name.into();
    let transform_name = name.clone();
    FnStageFactory::new(name, move |_config| {
        let transform = FnTransform::new(transform_name.clone(), func.clone());
        Ok(Binding::new(Arc::new(transform)).with_access(access.clone()))
    })
}

impl<B> Debug for FnStageFactory<B>
where
    B: Fn(&PipelineConfig) -> Result<Binding, ConfigurationError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStageFactory")
            .field("name", &self.name)
            .finish()
    }
}

impl<B> StageFactory for FnStageFactory<B>
where
    B: Fn(&PipelineConfig) -> Result<Binding, ConfigurationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        (self.bind)(config)
    }
}
