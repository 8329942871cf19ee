//! Aperture masking.
//!
//! Particles outside the square field of view keep their positions and
//! velocities; every other per-particle attribute is zeroed and a `mask`
//! attribute (1 inside, 0 outside) is written.

use super::{component_mut, particle_categories, vectors, SpatialGrid};
use crate::config::PipelineConfig;
use crate::context::{array1, Category, ContextShape, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::StageScope;
use crate::stages::{AttributeAccess, Binding, StageFactory, Transform};
use ndarray::Axis;
use serde_json::json;
use std::sync::Arc;

/// Factory for `filter_particles`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterParticles;

impl FilterParticles {
    /// The stage name.
    pub const NAME: &'static str = "filter_particles";
}

impl StageFactory for FilterParticles {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        let grid = SpatialGrid::from_config(config).map_err(|e| e.in_stage(Self::NAME))?;
        let categories = particle_categories(config).map_err(|e| e.in_stage(Self::NAME))?;

        let mut access = AttributeAccess::new()
            .reads_each(&categories, "coords")
            .writes_each(&categories, "mask");
        for &category in &categories {
            access = access.may_write_all(category, category.maskable_attributes());
        }
        let snapshot = json!({
            "fov": grid.fov,
            "particle_type": categories,
        });

        Ok(Binding::new(Arc::new(FilterTransform { grid, categories }))
            .with_snapshot(snapshot)
            .with_access(access))
    }
}

/// Per category, the maskable attributes present with one row per particle.
type MaskTargets = Vec<(Category, Vec<String>)>;

fn mask_targets(shape: &ContextShape, categories: &[Category]) -> MaskTargets {
    categories
        .iter()
        .map(|&category| {
            let names = shape
                .component(category)
                .map(|component| {
                    let count = component.particle_count();
                    category
                        .maskable_attributes()
                        .iter()
                        .filter(|name| {
                            component
                                .arrays
                                .get(**name)
                                .is_some_and(|dims| dims.first().copied() == count)
                        })
                        .map(|name| (*name).to_string())
                        .collect()
                })
                .unwrap_or_default();
            (category, names)
        })
        .collect()
}

fn filter(
    grid: &SpatialGrid,
    targets: &MaskTargets,
    ctx: &mut RubixData,
    scope: &StageScope<'_>,
) -> anyhow::Result<()> {
    for (category, names) in targets {
        let category = *category;
        let component = component_mut(ctx, category)?;
        let inside: Vec<bool> = vectors(component, category, "coords")?
            .rows()
            .into_iter()
            .map(|row| grid.contains(row[0], row[1]))
            .collect();

        for name in names {
            let Some(array) = component.array_mut(name) else {
                continue;
            };
            anyhow::ensure!(
                array.shape().first() == Some(&inside.len()),
                "'{category}/{name}' does not have one row per particle"
            );
            for (i, keep) in inside.iter().enumerate() {
                if !keep {
                    array.index_axis_mut(Axis(0), i).fill(0.0);
                }
            }
        }

        let masked = inside.iter().filter(|keep| !**keep).count();
        scope.debug(&format!("masked {masked} of {} {category} particles", inside.len()));
        component.set_array(
            "mask",
            array1(inside.iter().map(|keep| f64::from(u8::from(*keep))).collect()),
        );
    }
    Ok(())
}

#[derive(Debug)]
struct FilterTransform {
    grid: SpatialGrid,
    categories: Vec<Category>,
}

impl Transform for FilterTransform {
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        let mut out = ctx.clone();
        self.apply_in_place(&mut out, scope)?;
        Ok(out)
    }

    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        let targets = mask_targets(&ctx.shape(), &self.categories);
        filter(&self.grid, &targets, ctx, scope)
    }

    fn specialize(&self, shape: &ContextShape) -> anyhow::Result<Option<Arc<dyn Transform>>> {
        Ok(Some(Arc::new(SpecializedFilter {
            grid: self.grid.clone(),
            targets: mask_targets(shape, &self.categories),
        })))
    }
}

/// A filter whose mask targets were resolved against one input shape.
#[derive(Debug)]
struct SpecializedFilter {
    grid: SpatialGrid,
    targets: MaskTargets,
}

impl Transform for SpecializedFilter {
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        let mut out = ctx.clone();
        filter(&self.grid, &self.targets, &mut out, scope)?;
        Ok(out)
    }

    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        filter(&self.grid, &self.targets, ctx, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{array_n3, AttributeRef, Component};
    use crate::observability::{NoOpTracingEmitter, RunScope};

    fn config() -> PipelineConfig {
        PipelineConfig::new(json!({
            "data": {"args": {"particle_type": ["stars"]}},
            "telescope": {"pixel_type": "square", "fov": 2.0, "sbin": 2},
        }))
    }

    fn stars() -> RubixData {
        RubixData::new().with_component(
            Category::Stars,
            Component::new()
                .with_array("coords", array_n3(&[[0.5, 0.5, 0.0], [3.0, 0.0, 0.0]]))
                .with_array("velocity", array_n3(&[[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]))
                .with_array("mass", array1(vec![10.0, 20.0]))
                .with_array("age", array1(vec![1.0, 2.0])),
        )
    }

    fn values(ctx: &RubixData, name: &str) -> Vec<f64> {
        ctx.array(Category::Stars, name).unwrap().iter().copied().collect()
    }

    #[test]
    fn test_masks_outside_particles() {
        let binding = FilterParticles.bind(&config()).unwrap();
        let run = RunScope::open("test", "linear", 1, Arc::new(NoOpTracingEmitter));
        let scope = run.stage(FilterParticles::NAME, 0);
        let out = binding.transform.apply(&stars(), &scope).unwrap();

        assert_eq!(values(&out, "mask"), vec![1.0, 0.0]);
        assert_eq!(values(&out, "mass"), vec![10.0, 0.0]);
        assert_eq!(values(&out, "age"), vec![1.0, 0.0]);
        // Kinematics are never masked.
        assert_eq!(values(&out, "velocity"), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(values(&out, "coords")[3], 3.0);
    }

    #[test]
    fn test_specialized_matches_generic() {
        let binding = FilterParticles.bind(&config()).unwrap();
        let input = stars();
        let specialized = binding
            .transform
            .specialize(&input.shape())
            .unwrap()
            .unwrap();

        let run = RunScope::open("test", "compiled", 1, Arc::new(NoOpTracingEmitter));
        let scope = run.stage(FilterParticles::NAME, 0);
        let mut fused = input.clone();
        specialized.apply_in_place(&mut fused, &scope).unwrap();
        assert_eq!(fused, binding.transform.apply(&input, &scope).unwrap());
    }

    #[test]
    fn test_declares_optional_writes() {
        let binding = FilterParticles.bind(&config()).unwrap();
        let mass = AttributeRef::new(Category::Stars, "mass");
        assert!(binding.access.owns(&mass));
        assert!(!binding.access.writes.contains(&mass));
        assert!(binding
            .access
            .writes
            .contains(&AttributeRef::new(Category::Stars, "mask")));
        assert!(!binding
            .access
            .owns(&AttributeRef::new(Category::Stars, "velocity")));
    }
}
