//! Structural descriptions of stages and sequences.
//!
//! An expression never holds a callable, so it can be built, logged,
//! compared and validated without a context.

use super::BoundStage;
use crate::context::Category;
use crate::errors::ConfigurationError;
use crate::stages::AttributeAccess;
use crate::utils::fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Description of one stage in a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionNode {
    /// The stage name.
    pub name: String,
    /// Zero-based position in the sequence.
    pub position: usize,
    /// Snapshot of the configuration the stage closed over.
    pub config: serde_json::Value,
    /// Declared attribute access.
    #[serde(default)]
    pub access: AttributeAccess,
}

/// Description of a whole sequence, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineExpression {
    nodes: Vec<ExpressionNode>,
}

impl PipelineExpression {
    /// Creates an expression from nodes.
    #[must_use]
    pub fn new(nodes: Vec<ExpressionNode>) -> Self {
        Self { nodes }
    }

    /// The nodes, in order.
    #[must_use]
    pub fn nodes(&self) -> &[ExpressionNode] {
        &self.nodes
    }

    /// Number of stages described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no stage is described.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Finds a node by stage name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&ExpressionNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Categories read or written by at least one stage.
    #[must_use]
    pub fn referenced_categories(&self) -> BTreeSet<Category> {
        self.nodes
            .iter()
            .flat_map(|n| n.access.categories())
            .collect()
    }

    /// Checks that every category in `required` is referenced by some stage.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first unreferenced category.
    pub fn require_categories(&self, required: &[Category]) -> Result<(), ConfigurationError> {
        let referenced = self.referenced_categories();
        match required.iter().find(|c| !referenced.contains(c)) {
            Some(missing) => Err(ConfigurationError::missing_category(missing)),
            None => Ok(()),
        }
    }

    /// Stable content hash of the expression.
    ///
    /// Equal expressions have equal fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.to_json())
    }

    /// JSON form: one object per stage.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// `[{name, config}]` pairs, without positions or access declarations.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        self.nodes
            .iter()
            .map(|n| serde_json::json!({"name": n.name, "config": n.config}))
            .collect()
    }
}

impl fmt::Display for PipelineExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stage_names().join(" -> "))
    }
}

/// Anything that can describe itself as a [`PipelineExpression`].
pub trait ToExpression {
    /// Builds the expression form.
    fn to_expression(&self) -> PipelineExpression;
}

impl ToExpression for BoundStage {
    fn to_expression(&self) -> PipelineExpression {
        PipelineExpression::new(vec![self.node(0)])
    }
}

impl ToExpression for [BoundStage] {
    fn to_expression(&self) -> PipelineExpression {
        PipelineExpression::new(
            self.iter()
                .enumerate()
                .map(|(position, stage)| stage.node(position))
                .collect(),
        )
    }
}

impl ToExpression for Vec<BoundStage> {
    fn to_expression(&self) -> PipelineExpression {
        self.as_slice().to_expression()
    }
}

/// Returns the expression form of a stage or sequence without running it.
#[must_use]
pub fn expression_transformer<T: ToExpression + ?Sized>(target: &T) -> PipelineExpression {
    target.to_expression()
}
