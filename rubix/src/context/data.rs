//! The context threaded through every stage.

use super::{AttributeRef, Category, ComponentShape, ContextShape};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One category's sub-record: named arrays plus scalar metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    arrays: BTreeMap<String, ArrayD<f64>>,
    #[serde(default)]
    scalars: BTreeMap<String, f64>,
}

impl Component {
    /// Creates an empty component.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an array attribute.
    #[must_use]
    pub fn with_array(mut self, name: impl Into<String>, value: ArrayD<f64>) -> Self {
        self.arrays.insert(name.into(), value);
        self
    }

    /// Adds a scalar attribute.
    #[must_use]
    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.scalars.insert(name.into(), value);
        self
    }

    /// Gets an array attribute.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.arrays.get(name)
    }

    /// Gets an array attribute mutably.
    pub fn array_mut(&mut self, name: &str) -> Option<&mut ArrayD<f64>> {
        self.arrays.get_mut(name)
    }

    /// Gets a scalar attribute.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    /// Sets (or overwrites) an array attribute.
    pub fn set_array(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        self.arrays.insert(name.into(), value);
    }

    /// Sets (or overwrites) a scalar attribute.
    pub fn set_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.scalars.insert(name.into(), value);
    }

    /// Whether an array or scalar with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name) || self.scalars.contains_key(name)
    }

    /// Iterates array attributes in name order.
    pub fn arrays(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates scalar attributes in name order.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scalars.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of particles, taken from the leading axis of the first array.
    ///
    /// `None` when the component holds no arrays.
    #[must_use]
    pub fn particle_count(&self) -> Option<usize> {
        self.arrays
            .get("coords")
            .or_else(|| self.arrays.values().next())
            .and_then(|arr| arr.shape().first().copied())
    }

    /// Structural description of this component.
    #[must_use]
    pub fn shape(&self) -> ComponentShape {
        ComponentShape {
            arrays: self
                .arrays
                .iter()
                .map(|(k, v)| (k.clone(), v.shape().to_vec()))
                .collect(),
            scalars: self.scalars.keys().cloned().collect(),
        }
    }
}

/// The record passed through a pipeline run.
///
/// Stages populate or overwrite attributes inside existing categories; the
/// set of categories is fixed when the context is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubixData {
    components: BTreeMap<Category, Component>,
}

impl RubixData {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a category sub-record.
    #[must_use]
    pub fn with_component(mut self, category: Category, component: Component) -> Self {
        self.components.insert(category, component);
        self
    }

    /// Adds a galaxy-level scalar, creating the galaxy record if needed.
    #[must_use]
    pub fn with_galaxy_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.components
            .entry(Category::Galaxy)
            .or_default()
            .set_scalar(name, value);
        self
    }

    /// Gets a category sub-record.
    #[must_use]
    pub fn component(&self, category: Category) -> Option<&Component> {
        self.components.get(&category)
    }

    /// Gets a category sub-record mutably.
    pub fn component_mut(&mut self, category: Category) -> Option<&mut Component> {
        self.components.get_mut(&category)
    }

    /// Whether the category sub-record exists.
    #[must_use]
    pub fn has_category(&self, category: Category) -> bool {
        self.components.contains_key(&category)
    }

    /// Iterates the categories present, in order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.components.keys().copied()
    }

    /// Iterates sub-records in category order.
    pub fn components(&self) -> impl Iterator<Item = (Category, &Component)> {
        self.components.iter().map(|(k, v)| (*k, v))
    }

    /// Gets an array attribute.
    #[must_use]
    pub fn array(&self, category: Category, name: &str) -> Option<&ArrayD<f64>> {
        self.component(category).and_then(|c| c.array(name))
    }

    /// Gets a scalar attribute.
    #[must_use]
    pub fn scalar(&self, category: Category, name: &str) -> Option<f64> {
        self.component(category).and_then(|c| c.scalar(name))
    }

    /// Whether the referenced attribute exists (as array or scalar).
    #[must_use]
    pub fn contains(&self, attr: &AttributeRef) -> bool {
        self.component(attr.category)
            .is_some_and(|c| c.contains(&attr.name))
    }

    /// Structural key of the whole context.
    #[must_use]
    pub fn shape(&self) -> ContextShape {
        ContextShape::new(
            self.components
                .iter()
                .map(|(k, v)| (*k, v.shape()))
                .collect(),
        )
    }
}

/// Builds a 1-D array from a vector.
#[must_use]
pub fn array1(values: Vec<f64>) -> ArrayD<f64> {
    let len = values.len();
    ArrayD::from_shape_vec(IxDyn(&[len]), values).unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0])))
}

/// Builds an `n x 3` array from rows.
#[must_use]
pub fn array_n3(rows: &[[f64; 3]]) -> ArrayD<f64> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&[rows.len(), 3]), flat)
        .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0, 3])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stars() -> Component {
        Component::new()
            .with_array("coords", array_n3(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]))
            .with_array("mass", array1(vec![10.0, 20.0]))
    }

    #[test]
    fn test_component_accessors() {
        let mut c = stars().with_scalar("softening", 0.1);
        assert_eq!(c.particle_count(), Some(2));
        assert!(c.contains("coords"));
        assert!(c.contains("softening"));
        assert!(!c.contains("age"));

        c.set_array("age", array1(vec![1.0, 2.0]));
        assert_eq!(c.array("age").map(|a| a.len()), Some(2));
        let names: Vec<&str> = c.arrays().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["age", "coords", "mass"]);
    }

    #[test]
    fn test_empty_component_has_no_count() {
        assert_eq!(Component::new().with_scalar("x", 1.0).particle_count(), None);
    }

    #[test]
    fn test_context_addressing() {
        let ctx = RubixData::new()
            .with_component(Category::Stars, stars())
            .with_galaxy_scalar("redshift", 0.1);

        assert!(ctx.has_category(Category::Stars));
        assert!(!ctx.has_category(Category::Gas));
        assert_eq!(ctx.scalar(Category::Galaxy, "redshift"), Some(0.1));
        assert!(ctx.contains(&AttributeRef::new(Category::Stars, "mass")));
        assert!(!ctx.contains(&AttributeRef::new(Category::Gas, "mass")));
        let categories: Vec<Category> = ctx.categories().collect();
        assert_eq!(categories, vec![Category::Galaxy, Category::Stars]);
    }

    #[test]
    fn test_shape_tracks_structure_not_values() {
        let a = RubixData::new().with_component(Category::Stars, stars());
        let mut b = a.clone();
        if let Some(mass) = b
            .component_mut(Category::Stars)
            .and_then(|c| c.array_mut("mass"))
        {
            mass.fill(0.0);
        }
        assert_ne!(a, b);
        assert_eq!(a.shape(), b.shape());

        let c = b.with_galaxy_scalar("redshift", 0.5);
        assert_ne!(a.shape(), c.shape());
    }

    #[test]
    fn test_serde_round_trip() {
        let ctx = RubixData::new()
            .with_component(Category::Stars, stars())
            .with_galaxy_scalar("x", 3.0);
        let json = serde_json::to_string(&ctx).unwrap();
        let back: RubixData = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
