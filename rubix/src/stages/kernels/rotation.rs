//! Galaxy rotation.

use super::{component_mut, particle_categories, vectors_mut};
use crate::config::PipelineConfig;
use crate::context::{Category, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::StageScope;
use crate::stages::{AttributeAccess, Binding, StageFactory, Transform};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const ROTATION_KEY: &str = "galaxy/rotation";
const ROTATED: [&str; 2] = ["coords", "velocity"];

type Matrix3 = [[f64; 3]; 3];

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationAngles {
    /// Rotation about the x axis.
    pub alpha: f64,
    /// Rotation about the y axis.
    pub beta: f64,
    /// Rotation about the z axis.
    pub gamma: f64,
}

impl RotationAngles {
    /// Creates angles from explicit values.
    #[must_use]
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    /// Reads angles from `galaxy/rotation`.
    ///
    /// A `type` of `face-on` or `edge-on` selects a preset; otherwise
    /// `alpha`, `beta` and `gamma` are all required.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is absent, the preset is unknown, or
    /// an angle is missing.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigurationError> {
        config.require(ROTATION_KEY)?;

        let type_key = format!("{ROTATION_KEY}/type");
        if config.contains(&type_key) {
            return match config.require_one_of(&type_key, &["face-on", "edge-on"])? {
                "edge-on" => Ok(Self::new(90.0, 0.0, 0.0)),
                _ => Ok(Self::new(0.0, 0.0, 0.0)),
            };
        }

        Ok(Self::new(
            config.require_f64(&format!("{ROTATION_KEY}/alpha"))?,
            config.require_f64(&format!("{ROTATION_KEY}/beta"))?,
            config.require_f64(&format!("{ROTATION_KEY}/gamma"))?,
        ))
    }

    /// The rotation matrix `Rz(gamma) * Ry(beta) * Rx(alpha)`.
    #[must_use]
    pub fn matrix(&self) -> Matrix3 {
        let (sa, ca) = self.alpha.to_radians().sin_cos();
        let (sb, cb) = self.beta.to_radians().sin_cos();
        let (sg, cg) = self.gamma.to_radians().sin_cos();

        let rx = [[1.0, 0.0, 0.0], [0.0, ca, -sa], [0.0, sa, ca]];
        let ry = [[cb, 0.0, sb], [0.0, 1.0, 0.0], [-sb, 0.0, cb]];
        let rz = [[cg, -sg, 0.0], [sg, cg, 0.0], [0.0, 0.0, 1.0]];
        matmul(&rz, &matmul(&ry, &rx))
    }
}

fn matmul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Factory for `rotate_galaxy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotateGalaxy;

impl RotateGalaxy {
    /// The stage name.
    pub const NAME: &'static str = "rotate_galaxy";
}

impl StageFactory for RotateGalaxy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        let angles = RotationAngles::from_config(config).map_err(|e| e.in_stage(Self::NAME))?;
        let categories = particle_categories(config).map_err(|e| e.in_stage(Self::NAME))?;

        let mut access = AttributeAccess::new();
        for name in ROTATED {
            access = access
                .reads_each(&categories, name)
                .writes_each(&categories, name);
        }
        let snapshot = json!({
            "rotation": angles,
            "particle_type": categories,
        });

        let transform = RotationTransform {
            matrix: angles.matrix(),
            categories,
        };
        Ok(Binding::new(Arc::new(transform))
            .with_snapshot(snapshot)
            .with_access(access))
    }
}

#[derive(Debug)]
struct RotationTransform {
    matrix: Matrix3,
    categories: Vec<Category>,
}

impl Transform for RotationTransform {
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        let mut out = ctx.clone();
        self.apply_in_place(&mut out, scope)?;
        Ok(out)
    }

    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        let m = &self.matrix;
        for &category in &self.categories {
            let component = component_mut(ctx, category)?;
            for name in ROTATED {
                let mut vectors = vectors_mut(component, category, name)?;
                for mut row in vectors.rows_mut() {
                    let v = [row[0], row[1], row[2]];
                    for (i, out) in row.iter_mut().enumerate() {
                        *out = m[i][0] * v[0] + m[i][1] * v[1] + m[i][2] * v[2];
                    }
                }
            }
            scope.debug(&format!("rotated {category}"));
        }
        Ok(())
    }
}
