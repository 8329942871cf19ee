//! Built-in stage factories for the galaxy-to-datacube pipeline.
//!
//! Each factory validates its slice of the configuration at bind time and
//! returns a transform that only fails on malformed context data.

mod aperture;
mod gas;
mod rotation;
mod spaxel;

pub use aperture::FilterParticles;
pub use gas::GasTemperature;
pub use rotation::{RotateGalaxy, RotationAngles};
pub use spaxel::{SpatialGrid, SpaxelAssignment};

use super::StageFactory;
use crate::config::PipelineConfig;
use crate::context::{Category, Component, RubixData};
use crate::errors::ConfigurationError;
use ndarray::{ArrayD, ArrayView2, ArrayViewMut2, Ix2};
use std::sync::Arc;

/// Configuration path listing the particle categories to process.
pub const PARTICLE_TYPE_KEY: &str = "data/args/particle_type";

/// Every built-in factory.
#[must_use]
pub fn builtin_factories() -> Vec<Arc<dyn StageFactory>> {
    vec![
        Arc::new(RotateGalaxy),
        Arc::new(FilterParticles),
        Arc::new(SpaxelAssignment),
        Arc::new(GasTemperature),
    ]
}

/// Reads the configured particle categories.
///
/// # Errors
///
/// Returns an error if the list is absent, empty, or names a non-particle
/// category.
pub fn particle_categories(config: &PipelineConfig) -> Result<Vec<Category>, ConfigurationError> {
    let names = config.str_list(PARTICLE_TYPE_KEY)?;
    if names.is_empty() {
        return Err(ConfigurationError::invalid_value(
            PARTICLE_TYPE_KEY,
            "at least one particle type is required",
        ));
    }

    let mut categories = Vec::with_capacity(names.len());
    for name in &names {
        let category: Category = name
            .parse()
            .map_err(|e| ConfigurationError::invalid_value(PARTICLE_TYPE_KEY, e))?;
        if !category.is_particle() {
            return Err(ConfigurationError::invalid_value(
                PARTICLE_TYPE_KEY,
                format!("'{name}' is not a particle category"),
            ));
        }
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories.sort();
    Ok(categories)
}

fn component_mut(ctx: &mut RubixData, category: Category) -> anyhow::Result<&mut Component> {
    ctx.component_mut(category)
        .ok_or_else(|| anyhow::anyhow!("context has no '{category}' record"))
}

fn component(ctx: &RubixData, category: Category) -> anyhow::Result<&Component> {
    ctx.component(category)
        .ok_or_else(|| anyhow::anyhow!("context has no '{category}' record"))
}

/// Views an `(n, 3)` attribute as a two-dimensional array.
fn vectors<'a>(
    component: &'a Component,
    category: Category,
    name: &str,
) -> anyhow::Result<ArrayView2<'a, f64>> {
    let array = component
        .array(name)
        .ok_or_else(|| anyhow::anyhow!("'{category}/{name}' is missing"))?;
    let view = array.view().into_dimensionality::<Ix2>()?;
    anyhow::ensure!(
        view.ncols() == 3,
        "'{category}/{name}' must have shape (n, 3), found {:?}",
        view.shape()
    );
    Ok(view)
}

/// Mutable counterpart of [`vectors`].
fn vectors_mut<'a>(
    component: &'a mut Component,
    category: Category,
    name: &str,
) -> anyhow::Result<ArrayViewMut2<'a, f64>> {
    let array: &mut ArrayD<f64> = component
        .array_mut(name)
        .ok_or_else(|| anyhow::anyhow!("'{category}/{name}' is missing"))?;
    let view = array.view_mut().into_dimensionality::<Ix2>()?;
    anyhow::ensure!(
        view.ncols() == 3,
        "'{category}/{name}' must have shape (n, 3), found {:?}",
        view.shape()
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_particle_categories_sorted_and_deduplicated() {
        let config = PipelineConfig::new(json!({
            "data": {"args": {"particle_type": ["stars", "gas", "stars"]}}
        }));
        assert_eq!(
            particle_categories(&config).unwrap(),
            vec![Category::Stars, Category::Gas]
        );
    }

    #[test]
    fn test_particle_categories_rejects_galaxy() {
        let config = PipelineConfig::new(json!({
            "data": {"args": {"particle_type": ["galaxy"]}}
        }));
        let err = particle_categories(&config).unwrap_err();
        assert_eq!(err.key.as_deref(), Some(PARTICLE_TYPE_KEY));
    }

    #[test]
    fn test_particle_categories_rejects_unknown_and_empty() {
        let unknown = PipelineConfig::new(json!({
            "data": {"args": {"particle_type": ["dark_matter"]}}
        }));
        assert!(particle_categories(&unknown).is_err());

        let empty = PipelineConfig::new(json!({"data": {"args": {"particle_type": []}}}));
        assert_eq!(
            particle_categories(&empty).unwrap_err().code(),
            Some("CONFIG-004-INVALID_VALUE")
        );
    }

    #[test]
    fn test_builtin_factory_names() {
        let names: Vec<String> = builtin_factories()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "rotate_galaxy",
                "filter_particles",
                "spaxel_assignment",
                "gas_temperature"
            ]
        );
    }
}
