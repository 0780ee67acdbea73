use anyhow::{Context, Result};
use gkpi_core::{AssetClass, CountMode, EpisodeStore, Quantity};
use serde::Serialize;

use super::GridKpi;
use crate::actions::ActionCounts;
use crate::energy::{
    balancing_energy, blackout_energy, curtailment_energy, dispatch_energy, lost_energy,
};

/// Operation score entries, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OperationScore {
    pub n_topo_sum: usize,
    pub n_redispatch_sum: usize,
    pub e_redispatch: f64,
    pub e_balancing: f64,
    pub n_curtail_sum: usize,
    pub e_curtailment: f64,
    pub e_lost: f64,
    pub e_blackout: f64,
}

impl OperationScore {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.n_topo_sum as f64,
            self.n_redispatch_sum as f64,
            self.e_redispatch,
            self.e_balancing,
            self.n_curtail_sum as f64,
            self.e_curtailment,
            self.e_lost,
            self.e_blackout,
        ]
    }
}

/// Action counts and energy totals over the whole episode.
#[derive(Debug, Clone, Default)]
pub struct OperationScoreKpi {
    count_mode: CountMode,
}

impl OperationScoreKpi {
    pub fn new(count_mode: CountMode) -> Self {
        Self { count_mode }
    }

    pub fn score(&self, episode: &dyn EpisodeStore) -> Result<OperationScore> {
        let log = episode.action_log()?;
        let counts = ActionCounts::from_log(&log, self.count_mode);

        let gens = episode.asset_table(AssetClass::Generator)?;
        let loads = episode.asset_table(AssetClass::Load)?;
        let gen_p = episode.series(Quantity::GenP)?;
        let actual = episode.series(Quantity::GenActualDispatch)?;
        let target = episode.series(Quantity::GenTargetDispatch)?;
        let before = episode.series(Quantity::GenPBeforeCurtail)?;
        let load_p = episode.series(Quantity::LoadP)?;

        let e_redispatch = dispatch_energy(&actual, &gens.names)
            .context("dispatch energy")?
            .total();
        let e_balancing = balancing_energy(&actual, &target, &gens.names)
            .context("balancing energy")?
            .total();
        let e_curtailment = curtailment_energy(&gen_p, &before, &gens.names)
            .context("curtailment energy")?
            .total();
        let e_lost = lost_energy(&gen_p, &gens.names, &load_p, &loads.names)
            .context("lost energy")?;
        let e_blackout =
            blackout_energy(&log.done, &load_p, &loads.names).context("blackout energy")?;

        Ok(OperationScore {
            n_topo_sum: counts.topological_total(),
            n_redispatch_sum: counts.redispatch_total(),
            e_redispatch: e_redispatch.value(),
            e_balancing: e_balancing.value(),
            n_curtail_sum: counts.curtailment_total(),
            e_curtailment: e_curtailment.value(),
            e_lost: e_lost.value(),
            e_blackout: e_blackout.value(),
        })
    }
}

impl GridKpi for OperationScoreKpi {
    fn name(&self) -> &str {
        "Operation score"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "n_topo_sum",
            "n_redispatch_sum",
            "e_redispatch",
            "e_balancing",
            "n_curtail_sum",
            "e_curtailment",
            "e_lost",
            "e_blackout",
        ]
    }

    fn evaluate(&self, episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        Ok(self.score(episode)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{scenario_a, scenario_b, scenario_c};

    #[test]
    fn counts_actions_by_kind() {
        let score = OperationScoreKpi::default()
            .score(&scenario_b().unwrap())
            .unwrap();
        assert_eq!(score.n_topo_sum, 0);
        assert_eq!(score.n_redispatch_sum, 1);
        assert_eq!(score.n_curtail_sum, 1);
    }

    #[test]
    fn quiet_episode_energies() {
        let score = OperationScoreKpi::default()
            .score(&scenario_a().unwrap())
            .unwrap();
        // two hourly intervals at 10 MW
        assert!((score.e_redispatch - 20.0).abs() < 1e-12);
        assert_eq!(score.e_balancing, 0.0);
        assert_eq!(score.e_curtailment, 0.0);
        assert_eq!(score.e_lost, 0.0);
        assert_eq!(score.e_blackout, 0.0);
    }

    #[test]
    fn blackout_energy_uses_step_before_termination() {
        let score = OperationScoreKpi::default()
            .score(&scenario_c().unwrap())
            .unwrap();
        assert!((score.e_blackout - 1.25).abs() < 1e-12);
        let v = score.to_vec();
        assert_eq!(v.len(), 8);
        assert_eq!(v[7], score.e_blackout);
    }
}
