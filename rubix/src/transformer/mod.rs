//! The three forms a stage sequence can take.
//!
//! - [`bound_transformer`]: one stage with its configuration closed over.
//! - [`compiled_transformer`]: a whole sequence fused into one callable.
//! - [`expression_transformer`]: a structural description, never executed.

mod bound;
mod compiled;
mod expression;

pub use bound::{bound_transformer, BoundStage};
pub use compiled::{compiled_transformer, CompiledTransformer, SpecializedPlan, DEFAULT_CACHE_CAPACITY};
pub use expression::{expression_transformer, ExpressionNode, PipelineExpression, ToExpression};
