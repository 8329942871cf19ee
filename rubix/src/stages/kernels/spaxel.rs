//! Spatial binning of particles onto the telescope's square spaxel grid.

use super::{component, component_mut, particle_categories, vectors};
use crate::config::PipelineConfig;
use crate::context::{array1, Category, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::StageScope;
use crate::stages::{AttributeAccess, Binding, StageFactory, Transform};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// A square grid of `sbin x sbin` spaxels spanning the field of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialGrid {
    /// Field of view, in the same units as particle coordinates.
    pub fov: f64,
    /// Number of bins along each axis.
    pub sbin: usize,
    /// The `sbin + 1` bin edges, shared by both axes.
    pub edges: Vec<f64>,
}

impl SpatialGrid {
    /// Creates a grid centred on the origin.
    #[must_use]
    pub fn new(fov: f64, sbin: usize) -> Self {
        let half = fov / 2.0;
        let step = fov / sbin as f64;
        let edges = (0..=sbin).map(|i| -half + step * i as f64).collect();
        Self { fov, sbin, edges }
    }

    /// Reads the grid from the `telescope` section.
    ///
    /// # Errors
    ///
    /// Returns an error unless `telescope/pixel_type` is `square`,
    /// `telescope/fov` is a positive number and `telescope/sbin` is a
    /// positive integer.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigurationError> {
        config.require_one_of("telescope/pixel_type", &["square"])?;

        let fov = config.require_f64("telescope/fov")?;
        if !(fov.is_finite() && fov > 0.0) {
            return Err(ConfigurationError::invalid_value(
                "telescope/fov",
                format!("expected a positive number, got {fov}"),
            ));
        }

        let sbin = config.require_u64("telescope/sbin")?;
        let sbin = usize::try_from(sbin)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigurationError::invalid_value("telescope/sbin", "expected a positive integer")
            })?;

        Ok(Self::new(fov, sbin))
    }

    /// Bin index along one axis, clipped into the grid.
    #[must_use]
    pub fn bin(&self, value: f64) -> usize {
        let upper = self.edges.partition_point(|edge| *edge <= value);
        upper.saturating_sub(1).min(self.sbin - 1)
    }

    /// Flattened spaxel index of a position, `x + sbin * y`.
    #[must_use]
    pub fn pixel(&self, x: f64, y: f64) -> usize {
        self.bin(x) + self.sbin * self.bin(y)
    }

    /// Whether a position falls inside the grid's square aperture.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (lo, hi) = (-self.fov / 2.0, self.fov / 2.0);
        (lo..=hi).contains(&x) && (lo..=hi).contains(&y)
    }
}

/// Factory for `spaxel_assignment`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaxelAssignment;

impl SpaxelAssignment {
    /// The stage name.
    pub const NAME: &'static str = "spaxel_assignment";
}

impl StageFactory for SpaxelAssignment {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        let grid = SpatialGrid::from_config(config).map_err(|e| e.in_stage(Self::NAME))?;
        let categories = particle_categories(config).map_err(|e| e.in_stage(Self::NAME))?;

        let access = AttributeAccess::new()
            .reads_each(&categories, "coords")
            .writes_each(&categories, "pixel_assignment")
            .writes_each(&categories, "spatial_bin_edges");
        let snapshot = json!({
            "pixel_type": "square",
            "fov": grid.fov,
            "sbin": grid.sbin,
            "particle_type": categories,
        });

        Ok(Binding::new(Arc::new(SpaxelTransform { grid, categories }))
            .with_snapshot(snapshot)
            .with_access(access))
    }
}

#[derive(Debug)]
struct SpaxelTransform {
    grid: SpatialGrid,
    categories: Vec<Category>,
}

impl Transform for SpaxelTransform {
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        let mut out = ctx.clone();
        self.apply_in_place(&mut out, scope)?;
        Ok(out)
    }

    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        for &category in &self.categories {
            let pixels: Vec<f64> = vectors(component(ctx, category)?, category, "coords")?
                .rows()
                .into_iter()
                .map(|row| self.grid.pixel(row[0], row[1]) as f64)
                .collect();
            scope.debug(&format!("assigned {} {category} particles", pixels.len()));

            let target = component_mut(ctx, category)?;
            target.set_array("pixel_assignment", array1(pixels));
            target.set_array("spatial_bin_edges", array1(self.grid.edges.clone()));
        }
        Ok(())
    }
}
