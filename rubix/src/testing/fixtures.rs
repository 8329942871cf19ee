//! Test fixtures for pipeline testing.

use crate::config::PipelineConfig;
use crate::context::{array1, array_n3, Category, Component, RubixData};
use crate::stages::StageFactory;
use crate::transformer::{bound_transformer, BoundStage};
use serde_json::json;

/// A context holding only the galaxy scalar `x`.
#[must_use]
pub fn x_context(x: f64) -> RubixData {
    RubixData::new().with_galaxy_scalar("x", x)
}

/// A small deterministic galaxy with `n_stars` stars and `n_gas` gas cells.
///
/// Particles are spread along a diagonal from `(-3, -3)` to `(3, 3)` so that
/// a field of view of 4 leaves the outermost ones outside the aperture.
#[must_use]
pub fn galaxy_fixture(n_stars: usize, n_gas: usize) -> RubixData {
    RubixData::new()
        .with_component(
            Category::Galaxy,
            Component::new()
                .with_scalar("redshift", 0.1)
                .with_scalar("halfmassrad_stars", 2.5)
                .with_array("center", array1(vec![0.0, 0.0, 0.0])),
        )
        .with_component(
            Category::Stars,
            Component::new()
                .with_array("coords", diagonal(n_stars))
                .with_array("velocity", diagonal(n_stars))
                .with_array("mass", ramp(n_stars, 1.0e6))
                .with_array("age", ramp(n_stars, 1.0))
                .with_array("metallicity", ramp(n_stars, 0.01)),
        )
        .with_component(
            Category::Gas,
            Component::new()
                .with_array("coords", diagonal(n_gas))
                .with_array("velocity", diagonal(n_gas))
                .with_array("mass", ramp(n_gas, 1.0e5))
                .with_array("density", ramp(n_gas, 0.1))
                .with_array("internal_energy", ramp(n_gas, 1.0e12))
                .with_array("electron_abundance", array1(vec![1.0; n_gas]))
                .with_array("metallicity", ramp(n_gas, 0.02))
                .with_array("sfr", ramp(n_gas, 0.5)),
        )
}

fn diagonal(n: usize) -> ndarray::ArrayD<f64> {
    let rows: Vec<[f64; 3]> = (0..n)
        .map(|i| {
            let t = if n > 1 {
                -3.0 + 6.0 * i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            [t, t, 0.5 * t]
        })
        .collect();
    array_n3(&rows)
}

fn ramp(n: usize, scale: f64) -> ndarray::ArrayD<f64> {
    array1((1..=n).map(|i| scale * i as f64).collect())
}

/// Configuration accepted by every built-in stage, with a `calc_ifu`
/// pipeline listing them in order.
#[must_use]
pub fn galaxy_config() -> PipelineConfig {
    PipelineConfig::new(json!({
        "data": {"args": {"particle_type": ["stars", "gas"]}},
        "galaxy": {"rotation": {"type": "edge-on"}},
        "telescope": {"pixel_type": "square", "fov": 4.0, "sbin": 4},
        "pipelines": {
            "calc_ifu": {
                "stages": [
                    "rotate_galaxy",
                    "filter_particles",
                    "spaxel_assignment",
                    "gas_temperature",
                ],
            },
        },
    }))
}

/// Binds a factory against an empty configuration.
///
/// # Panics
///
/// Panics if the factory rejects the configuration.
#[must_use]
pub fn bind<F: StageFactory + ?Sized>(factory: &F) -> BoundStage {
    bind_with(factory, &PipelineConfig::empty())
}

/// Binds a factory against `config`.
///
/// # Panics
///
/// Panics if the factory rejects the configuration.
#[must_use]
pub fn bind_with<F: StageFactory + ?Sized>(factory: &F, config: &PipelineConfig) -> BoundStage {
    match bound_transformer(factory, config) {
        Ok(stage) => stage,
        Err(err) => panic!("failed to bind '{}': {err}", factory.name()),
    }
}
