//! Gas temperature from internal energy.

use super::{component, component_mut, particle_categories, PARTICLE_TYPE_KEY};
use crate::config::PipelineConfig;
use crate::context::{Category, RubixData};
use crate::errors::ConfigurationError;
use crate::observability::StageScope;
use crate::stages::{AttributeAccess, Binding, StageFactory, Transform};
use ndarray::Zip;
use serde_json::json;
use std::sync::Arc;

/// Hydrogen mass fraction.
pub const HYDROGEN_FRACTION: f64 = 0.76;
/// Proton mass in grams.
pub const PROTON_MASS: f64 = 1.672_621_9e-24;
/// Adiabatic index of a monatomic ideal gas.
pub const ADIABATIC_INDEX: f64 = 5.0 / 3.0;
/// Boltzmann constant in erg/K.
pub const BOLTZMANN: f64 = 1.380_648_52e-16;

/// Temperature of one gas cell.
#[must_use]
pub fn temperature(internal_energy: f64, electron_abundance: f64) -> f64 {
    let x_h = HYDROGEN_FRACTION;
    let mean_weight = 4.0 / (1.0 + 3.0 * x_h + 4.0 * x_h * electron_abundance) * PROTON_MASS;
    (ADIABATIC_INDEX - 1.0) * internal_energy / BOLTZMANN * mean_weight
}

/// Factory for `gas_temperature`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GasTemperature;

impl GasTemperature {
    /// The stage name.
    pub const NAME: &'static str = "gas_temperature";
}

impl StageFactory for GasTemperature {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn bind(&self, config: &PipelineConfig) -> Result<Binding, ConfigurationError> {
        let categories = particle_categories(config).map_err(|e| e.in_stage(Self::NAME))?;
        if !categories.contains(&Category::Gas) {
            return Err(ConfigurationError::invalid_value(
                PARTICLE_TYPE_KEY,
                "gas temperature requires the 'gas' particle type",
            )
            .with_stage(Self::NAME));
        }

        let access = AttributeAccess::new()
            .reads(Category::Gas, "internal_energy")
            .reads(Category::Gas, "electron_abundance")
            .writes(Category::Gas, "temperature");

        Ok(Binding::new(Arc::new(GasTemperatureTransform))
            .with_snapshot(json!({"particle_type": ["gas"]}))
            .with_access(access))
    }
}

#[derive(Debug)]
struct GasTemperatureTransform;

impl Transform for GasTemperatureTransform {
    fn apply(&self, ctx: &RubixData, scope: &StageScope<'_>) -> anyhow::Result<RubixData> {
        let mut out = ctx.clone();
        self.apply_in_place(&mut out, scope)?;
        Ok(out)
    }

    fn apply_in_place(&self, ctx: &mut RubixData, scope: &StageScope<'_>) -> anyhow::Result<()> {
        let gas = component(ctx, Category::Gas)?;
        let energy = gas
            .array("internal_energy")
            .ok_or_else(|| anyhow::anyhow!("'gas/internal_energy' is missing"))?;
        let abundance = gas
            .array("electron_abundance")
            .ok_or_else(|| anyhow::anyhow!("'gas/electron_abundance' is missing"))?;
        anyhow::ensure!(
            energy.shape() == abundance.shape(),
            "internal_energy {:?} and electron_abundance {:?} differ in shape",
            energy.shape(),
            abundance.shape()
        );

        let temperatures = Zip::from(energy)
            .and(abundance)
            .map_collect(|&u, &ne| temperature(u, ne));
        scope.debug(&format!("computed {} gas temperatures", temperatures.len()));

        component_mut(ctx, Category::Gas)?.set_array("temperature", temperatures);
        Ok(())
    }
}
