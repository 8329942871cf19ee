//! Pipeline building and execution.
//!
//! This module provides:
//! - the [`AbstractPipeline`] contract
//! - [`LinearTransformerPipeline`], the sequential engine
//! - [`PipelineBuilder`] with bind-time validation
//! - [`StageRegistry`] and config-driven assembly

mod builder;
mod contracts;
mod interfaces;
mod linear;
mod registry;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use interfaces::AbstractPipeline;
pub use linear::LinearTransformerPipeline;
pub use registry::{build_pipeline, StageRegistry};
