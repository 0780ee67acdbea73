use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gkpi_core::{AssetClass, EpisodeStore, KpiError, Quantity};
use tracing::debug;

use super::GridKpi;
use crate::energy::{curtailment_energy, dispatch_energy};

/// Generator fuel column of the generator asset table.
pub const FUEL_COLUMN: &str = "type";

/// Emission factor averaged over fuel types, weighted by the curtailment plus
/// dispatch energy of each type.
#[derive(Debug, Clone)]
pub struct CarbonIntensityKpi {
    emission_factors: BTreeMap<String, f64>,
}

impl CarbonIntensityKpi {
    pub fn new(emission_factors: BTreeMap<String, f64>) -> Self {
        Self { emission_factors }
    }
}

impl Default for CarbonIntensityKpi {
    fn default() -> Self {
        Self::new(gkpi_core::config::default_emission_factors())
    }
}

impl GridKpi for CarbonIntensityKpi {
    fn name(&self) -> &str {
        "Carbon Intensity"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["carbon_intensity"]
    }

    fn evaluate(&self, episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        let gens = episode.asset_table(AssetClass::Generator)?;
        let gen_p = episode.series(Quantity::GenP)?;
        let before = episode.series(Quantity::GenPBeforeCurtail)?;
        let dispatch = episode.series(Quantity::GenActualDispatch)?;

        let curtailed = curtailment_energy(&gen_p, &before, &gens.names)
            .context("curtailment energy")?;
        let dispatched = dispatch_energy(&dispatch, &gens.names).context("dispatch energy")?;
        let energy = curtailed.plus(&dispatched)?;

        let mut by_fuel: BTreeMap<&str, f64> = BTreeMap::new();
        for (name, e) in energy.names.iter().zip(&energy.energy) {
            let fuel = gens.attribute_of(FUEL_COLUMN, name)?;
            *by_fuel.entry(fuel).or_insert(0.0) += e.value();
        }

        let mut weighted = 0.0;
        for (fuel, e) in &by_fuel {
            let factor = self.emission_factors.get(*fuel).ok_or_else(|| {
                KpiError::Validation(format!("no emission factor for fuel type '{}'", fuel))
            })?;
            weighted += e * factor;
        }
        let total: f64 = by_fuel.values().sum();
        debug!("carbon intensity over {} fuel types, {} MWh", by_fuel.len(), total);

        if total == 0.0 {
            return Ok(vec![0.0]);
        }
        Ok(vec![weighted / total])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{constant, names, scenario_a, two_bus_episode};
    use gkpi_core::AssetTable;

    #[test]
    fn single_hydro_generator_has_hydro_intensity() {
        let episode = scenario_a().unwrap();
        let value = CarbonIntensityKpi::default().evaluate(&episode).unwrap();
        assert_eq!(value.len(), 1);
        assert!((value[0] - 24.0).abs() < 1e-12);
    }

    #[test]
    fn zero_energy_reports_zero() {
        let time = [0.0, 3600.0];
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_series(Quantity::GenP, constant(&time, &["gen_0_0"], 0.0).unwrap())
            .with_series(
                Quantity::GenPBeforeCurtail,
                constant(&time, &["gen_0_0"], 0.0).unwrap(),
            )
            .with_series(
                Quantity::GenActualDispatch,
                constant(&time, &["gen_0_0"], 0.0).unwrap(),
            );
        assert_eq!(
            CarbonIntensityKpi::default().evaluate(&episode).unwrap(),
            vec![0.0]
        );
    }

    #[test]
    fn mixed_fuels_are_energy_weighted() {
        let time = [0.0, 3600.0];
        let gens = ["g_hydro", "g_thermal"];
        let table = AssetTable::new(AssetClass::Generator, names(&gens))
            .with_attribute(FUEL_COLUMN, names(&["hydro", "thermal"]))
            .unwrap();
        let dispatch = crate::test_utils::series(
            &time,
            vec![("g_hydro", vec![0.0, 30.0]), ("g_thermal", vec![0.0, 10.0])],
        )
        .unwrap();
        let flat = constant(&time, &gens, 5.0).unwrap();
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_assets(AssetClass::Generator, table)
            .with_series(Quantity::GenP, flat.clone())
            .with_series(Quantity::GenPBeforeCurtail, flat)
            .with_series(Quantity::GenActualDispatch, dispatch);
        let value = CarbonIntensityKpi::default().evaluate(&episode).unwrap();
        let expected = (30.0 * 24.0 + 10.0 * 655.0) / 40.0;
        assert!((value[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_fuel_is_an_error() {
        let time = [0.0, 3600.0];
        let table = AssetTable::new(AssetClass::Generator, names(&["gen_0_0"]))
            .with_attribute(FUEL_COLUMN, names(&["fusion"]))
            .unwrap();
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_assets(AssetClass::Generator, table);
        assert!(CarbonIntensityKpi::default().evaluate(&episode).is_err());
    }
}
