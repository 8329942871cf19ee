//! # Rubix
//!
//! A stage pipeline engine for turning galaxy particle data into synthetic
//! telescope observations.
//!
//! A run threads one [`RubixData`](context::RubixData) record through an
//! ordered list of stages. Each stage is bound to its configuration once and
//! is then a pure `RubixData -> RubixData` step. A registered sequence can be
//! used in three forms:
//!
//! - **Linear**: [`LinearTransformerPipeline`](pipeline::LinearTransformerPipeline)
//!   runs the stages one after another, checking attribute contracts between
//!   them and reporting failures at the stage that raised them.
//! - **Compiled**: [`compiled_transformer`](transformer::compiled_transformer)
//!   fuses the sequence into one callable, specialized per input shape.
//! - **Expression**: [`expression_transformer`](transformer::expression_transformer)
//!   describes the sequence without running it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rubix::prelude::*;
//!
//! let config = PipelineConfig::from_json_str(CONFIG_JSON)?;
//! let pipeline = build_pipeline(&StageRegistry::with_builtins(), &config, "calc_ifu")?;
//!
//! let observed = pipeline.run(galaxy)?;
//! println!("{}", pipeline.describe());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod transformer;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngineSettings, LogSettings, PipelineConfig};
    pub use crate::context::{AttributeRef, Category, Component, ContextShape, RubixData};
    pub use crate::errors::{
        ConfigurationError, ContractViolationError, RubixError, StageExecutionError,
        StageLocator, ViolationKind,
    };
    pub use crate::observability::{
        init_logging, LoggingTracingEmitter, NoOpTracingEmitter, RunReport, StageScope,
        TracingEmitter,
    };
    pub use crate::pipeline::{
        build_pipeline, AbstractPipeline, LinearTransformerPipeline, PipelineBuilder,
        StageRegistry,
    };
    pub use crate::stages::{stateless, AttributeAccess, Binding, StageFactory, Transform};
    pub use crate::transformer::{
        bound_transformer, compiled_transformer, expression_transformer, BoundStage,
        CompiledTransformer, PipelineExpression, ToExpression,
    };
}
