//! Structural keys for contexts.
//!
//! Two contexts with equal shapes carry the same categories, the same
//! attribute names and arrays of the same dimensions. The compiled form
//! caches specializations under this key.

use super::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Structure of one category sub-record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentShape {
    /// Array attribute names and their dimensions.
    pub arrays: BTreeMap<String, Vec<usize>>,
    /// Scalar attribute names.
    pub scalars: BTreeSet<String>,
}

impl ComponentShape {
    /// Leading axis length shared by the arrays, if any array exists.
    #[must_use]
    pub fn particle_count(&self) -> Option<usize> {
        self.arrays
            .get("coords")
            .or_else(|| self.arrays.values().next())
            .and_then(|dims| dims.first().copied())
    }
}

/// Structure of a whole context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextShape {
    components: BTreeMap<Category, ComponentShape>,
}

impl ContextShape {
    /// Creates a shape from per-category shapes.
    #[must_use]
    pub fn new(components: BTreeMap<Category, ComponentShape>) -> Self {
        Self { components }
    }

    /// Gets one category's shape.
    #[must_use]
    pub fn component(&self, category: Category) -> Option<&ComponentShape> {
        self.components.get(&category)
    }

    /// The categories present.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        self.components.keys().copied().collect()
    }

    /// Dimensions of an array attribute.
    #[must_use]
    pub fn dims(&self, category: Category, name: &str) -> Option<&[usize]> {
        self.components
            .get(&category)
            .and_then(|c| c.arrays.get(name))
            .map(Vec::as_slice)
    }
}

impl fmt::Display for ContextShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (category, shape) in &self.components {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{category}{{")?;
            let mut parts: Vec<String> = shape
                .arrays
                .iter()
                .map(|(name, dims)| format!("{name}{dims:?}"))
                .collect();
            parts.extend(shape.scalars.iter().cloned());
            write!(f, "{}}}", parts.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{array1, array_n3, Component, RubixData};
    use std::collections::HashSet;

    #[test]
    fn test_shape_hashes_by_structure() {
        let a = RubixData::new().with_component(
            Category::Stars,
            Component::new().with_array("mass", array1(vec![1.0, 2.0])),
        );
        let b = RubixData::new().with_component(
            Category::Stars,
            Component::new().with_array("mass", array1(vec![3.0, 4.0])),
        );
        let c = RubixData::new().with_component(
            Category::Stars,
            Component::new().with_array("mass", array1(vec![3.0, 4.0, 5.0])),
        );

        let mut seen = HashSet::new();
        seen.insert(a.shape());
        assert!(seen.contains(&b.shape()));
        assert!(!seen.contains(&c.shape()));
    }

    #[test]
    fn test_shape_queries() {
        let ctx = RubixData::new()
            .with_component(
                Category::Gas,
                Component::new().with_array("coords", array_n3(&[[0.0; 3]; 4])),
            )
            .with_galaxy_scalar("redshift", 0.0);
        let shape = ctx.shape();

        assert_eq!(shape.dims(Category::Gas, "coords"), Some(&[4, 3][..]));
        assert_eq!(
            shape.component(Category::Gas).and_then(ComponentShape::particle_count),
            Some(4)
        );
        assert_eq!(shape.categories().len(), 2);
        assert_eq!(shape.to_string(), "galaxy{redshift}; gas{coords[4, 3]}");
    }
}
