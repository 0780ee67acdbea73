//! Network utilization analysis.
//!
//! Replays every live step of an episode into the network model, runs one
//! full N-1 security analysis per step and reduces the branch currents into
//! loading ratios ("rho").
//!
//! ## Pipeline
//!
//! 1. Base-case rho is read from the recorded `line_rho` table.
//! 2. Every branch of the model is a contingency and a monitored element.
//! 3. For each step before termination, the replayer applies the recorded
//!    setpoints and the engine solves the base case plus every contingency.
//! 4. `rho = max(|I1|, |I2|) / thermal_limit` fills a (step, contingency,
//!    episode line) cube; a missing flow reads as zero current.
//!
//! Divergence never aborts the analysis. A non-converged base case is
//! counted in `n_div`, a non-converged contingency case in `n1_div`, and
//! every affected case contributes `divergent_current` instead of its flows.
//! A contingency the engine returns no result for is substituted the same
//! way but is not counted.

use std::sync::Arc;

use gkpi_core::{
    Amperes, AssetClass, EpisodeStore, KpiResult, PowerFlowEngine, Quantity, SecurityAnalysis,
    SecurityAnalysisResult,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::replay::{NetworkStateReplayer, ReplayReport};

/// Loading ratio of one measurement. Unusable limits give 0.
pub fn loading_ratio(current: Amperes, thermal_limit: f64) -> f64 {
    if !thermal_limit.is_finite() || thermal_limit <= 0.0 {
        return 0.0;
    }
    let current = current.value().abs();
    if current.is_finite() {
        current / thermal_limit
    } else {
        0.0
    }
}

/// Dense (step, contingency, branch) tensor of loading ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RhoCube {
    pub steps: usize,
    pub contingencies: Vec<String>,
    pub branches: Vec<String>,
    data: Vec<f64>,
}

impl RhoCube {
    pub fn zeros(steps: usize, contingencies: Vec<String>, branches: Vec<String>) -> Self {
        let len = steps * contingencies.len() * branches.len();
        Self {
            steps,
            contingencies,
            branches,
            data: vec![0.0; len],
        }
    }

    fn offset(&self, step: usize, contingency: usize, branch: usize) -> usize {
        (step * self.contingencies.len() + contingency) * self.branches.len() + branch
    }

    pub fn get(&self, step: usize, contingency: usize, branch: usize) -> f64 {
        self.data[self.offset(step, contingency, branch)]
    }

    pub fn set(&mut self, step: usize, contingency: usize, branch: usize, rho: f64) {
        let i = self.offset(step, contingency, branch);
        self.data[i] = rho;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

/// max, mean and overload percentage of a set of rho observations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RhoSummary {
    pub max: f64,
    pub mean: f64,
    pub overload_pct: f64,
}

impl RhoSummary {
    /// Non-finite observations are ignored; an empty set summarizes to zeros.
    pub fn of<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut overloaded = 0usize;
        for v in values.into_iter().copied().filter(|v| v.is_finite()) {
            count += 1;
            sum += v;
            max = max.max(v);
            if v > 1.0 {
                overloaded += 1;
            }
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            max,
            mean: sum / count as f64,
            overload_pct: overloaded as f64 * 100.0 / count as f64,
        }
    }
}

/// Scalar outputs of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UtilizationStats {
    pub n: RhoSummary,
    pub n1: RhoSummary,
    pub n_div: usize,
    pub n1_div: usize,
}

impl UtilizationStats {
    /// `[max N, max N-1, mean N, mean N-1, overload% N, overload% N-1, n_div, n1_div]`
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.n.max,
            self.n1.max,
            self.n.mean,
            self.n1.mean,
            self.n.overload_pct,
            self.n1.overload_pct,
            self.n_div as f64,
            self.n1_div as f64,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct UtilizationReport {
    pub stats: UtilizationStats,
    pub cube: RhoCube,
    pub replay: Vec<ReplayReport>,
}

/// Drives replay and security analysis over one episode.
#[derive(Clone)]
pub struct UtilizationAnalysis {
    engine: Arc<dyn PowerFlowEngine>,
    divergent_current: Amperes,
}

impl UtilizationAnalysis {
    pub fn new(engine: Arc<dyn PowerFlowEngine>, divergent_current: f64) -> Self {
        Self {
            engine,
            divergent_current: Amperes(divergent_current),
        }
    }

    pub fn run(&self, store: &dyn EpisodeStore) -> KpiResult<UtilizationReport> {
        let log = store.action_log()?;
        let metadata = store.metadata()?;
        let lines = store.asset_table(AssetClass::Line)?;
        let line_rho = store.series(Quantity::LineRho)?;
        let thermal_limit = store.series(Quantity::LineThermalLimit)?;
        let mut model = store.network()?;

        let live = log.live_steps();
        if live < log.len() {
            info!("episode terminates at step {}; replaying {} steps", live, live);
        }

        let n_steps = live.min(line_rho.len());
        let rho_n = RhoSummary::of(
            line_rho
                .values
                .iter()
                .flat_map(|column| column[..n_steps].iter()),
        );

        let branch_ids = model.branch_ids();
        let analysis = SecurityAnalysis::n_minus_one(&branch_ids);
        let monitored: Vec<Option<String>> = lines
            .names
            .iter()
            .map(|name| {
                let id = model.resolve_id(AssetClass::Line, name);
                if id.id().is_none() {
                    warn!("line '{}' not found in network; its N-1 rho is 0", name);
                }
                id.id().map(str::to_string)
            })
            .collect();

        let replayer = NetworkStateReplayer::new(store, &model, metadata.n_busbar_per_sub)?;
        let mut cube = RhoCube::zeros(live, branch_ids.clone(), lines.names.clone());
        let mut reports = Vec::with_capacity(live);
        let mut n_div = 0;
        let mut n1_div = 0;

        for step in 0..live {
            reports.push(replayer.apply_step(&mut model, step)?);
            let result = self.engine.solve_with_contingencies(&model, &analysis)?;

            let base_ok = result.pre_contingency.status.is_converged();
            if !base_ok {
                n_div += 1;
                warn!(
                    "load flow did not converge on N state at step {} ({:?})",
                    step, result.pre_contingency.status
                );
            }

            for (c, contingency) in analysis.contingencies.iter().enumerate() {
                let case_ok = match result.post_contingency.get(&contingency.id) {
                    Some(case) if case.status.is_converged() => true,
                    Some(case) => {
                        n1_div += 1;
                        warn!(
                            "load flow did not converge at step {} for contingency '{}' ({:?})",
                            step, contingency.id, case.status
                        );
                        false
                    }
                    // no currents to read, but nothing diverged either
                    None => {
                        warn!(
                            "no result at step {} for contingency '{}'",
                            step, contingency.id
                        );
                        false
                    }
                };
                let substitute = !(base_ok && case_ok);

                for (b, name) in lines.names.iter().enumerate() {
                    let current = self.current(
                        &result,
                        &contingency.id,
                        &contingency.element_id,
                        monitored[b].as_deref(),
                        substitute,
                    );
                    let limit = thermal_limit.value(name, step)?;
                    cube.set(step, c, b, loading_ratio(current, limit));
                }
            }
            debug!("step {} analysed ({} contingencies)", step, analysis.contingencies.len());
        }

        let stats = UtilizationStats {
            n: rho_n,
            n1: RhoSummary::of(cube.values()),
            n_div,
            n1_div,
        };
        info!(
            "network utilization: {} steps, {} contingencies, n_div={}, n1_div={}",
            live,
            analysis.contingencies.len(),
            n_div,
            n1_div
        );
        Ok(UtilizationReport {
            stats,
            cube,
            replay: reports,
        })
    }

    /// Current of a monitored branch in one contingency case.
    fn current(
        &self,
        result: &SecurityAnalysisResult,
        contingency_id: &str,
        outaged_id: &str,
        branch_id: Option<&str>,
        substitute: bool,
    ) -> Amperes {
        let Some(branch_id) = branch_id else {
            return Amperes(0.0);
        };
        if branch_id == outaged_id {
            return Amperes(0.0);
        }
        if substitute {
            return self.divergent_current;
        }
        result
            .flow(Some(contingency_id), branch_id)
            .map(|currents| currents.max())
            .unwrap_or(Amperes(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{constant, scenario_d, two_bus_episode, FakeEngine};

    #[test]
    fn rho_is_zero_for_unusable_limits() {
        assert_eq!(loading_ratio(Amperes(100.0), f64::INFINITY), 0.0);
        assert_eq!(loading_ratio(Amperes(100.0), 0.0), 0.0);
        assert_eq!(loading_ratio(Amperes(100.0), f64::NAN), 0.0);
        assert_eq!(loading_ratio(Amperes(-50.0), 100.0), 0.5);
    }

    #[test]
    fn summary_of_empty_set_is_zero() {
        let empty: [f64; 0] = [];
        assert_eq!(RhoSummary::of(&empty), RhoSummary::default());
        let s = RhoSummary::of(&[0.5, 1.5, f64::NAN, 1.0]);
        assert_eq!(s.max, 1.5);
        assert!((s.mean - 1.0).abs() < 1e-12);
        assert!((s.overload_pct - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn cube_indexing() {
        let mut cube = RhoCube::zeros(2, vec!["a".into(), "b".into()], vec!["x".into()]);
        cube.set(1, 1, 0, 0.7);
        assert_eq!(cube.get(1, 1, 0), 0.7);
        assert_eq!(cube.get(1, 0, 0), 0.0);
        assert_eq!(cube.len(), 4);
    }

    #[test]
    fn outaged_branch_reads_zero_and_others_are_loaded() {
        let episode = two_bus_episode(&[0.0, 300.0]).unwrap();
        let engine = Arc::new(FakeEngine::new(250.0));
        let report = UtilizationAnalysis::new(engine.clone(), 0.0)
            .run(&episode)
            .unwrap();
        assert_eq!(engine.calls(), 2);
        // contingency L0 removes line "0_1_0"
        assert_eq!(report.cube.get(0, 0, 0), 0.0);
        assert!((report.cube.get(0, 0, 1) - 0.5).abs() < 1e-12);
        assert!(report.cube.values().iter().all(|r| *r >= 0.0));
        assert_eq!(report.stats.n.max, 0.5);
        assert_eq!(report.stats.n_div, 0);
    }

    #[test]
    fn base_divergence_is_counted_not_fatal() {
        let episode = scenario_d().unwrap();
        let engine = Arc::new(FakeEngine::new(100.0).fail_base_at(2));
        let report = UtilizationAnalysis::new(engine, 0.0).run(&episode).unwrap();

        assert_eq!(report.stats.n_div, 1);
        assert_eq!(report.stats.n1_div, 0);
        for c in 0..2 {
            for b in 0..2 {
                assert_eq!(report.cube.get(2, c, b), 0.0);
            }
        }
        assert!((report.cube.get(1, 0, 1) - 0.2).abs() < 1e-12);
        // four live steps with two loaded pairs each, over 20 entries
        assert!((report.stats.n1.mean - 0.08).abs() < 1e-12);
        assert_eq!(report.stats.to_vec().len(), 8);
    }

    #[test]
    fn divergent_current_is_configurable() {
        let episode = scenario_d().unwrap();
        let engine = Arc::new(FakeEngine::new(100.0).fail_contingency_at(0, "L1"));
        let report = UtilizationAnalysis::new(engine, 750.0).run(&episode).unwrap();
        assert_eq!(report.stats.n1_div, 1);
        assert!((report.cube.get(0, 1, 0) - 1.5).abs() < 1e-12);
        assert!(report.stats.n1.overload_pct > 0.0);
    }

    #[test]
    fn missing_contingency_result_is_substituted_but_not_divergent() {
        let episode = scenario_d().unwrap();
        let engine = Arc::new(FakeEngine::new(100.0).omit_contingency_at(0, "L1"));
        let report = UtilizationAnalysis::new(engine, 750.0).run(&episode).unwrap();
        assert_eq!(report.stats.n1_div, 0);
        assert!((report.cube.get(0, 1, 0) - 1.5).abs() < 1e-12);
        assert_eq!(report.cube.get(0, 1, 1), 0.0);
    }

    #[test]
    fn steps_after_termination_are_not_solved() {
        let time = [0.0, 300.0, 600.0];
        let mut log = crate::test_utils::quiet_log(&time);
        log.done[1] = true;
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_series(
                Quantity::LineRho,
                constant(&time, &["0_1_0", "0_1_1"], 0.4).unwrap(),
            )
            .with_actions(log);
        let engine = Arc::new(FakeEngine::new(100.0));
        let report = UtilizationAnalysis::new(engine.clone(), 0.0)
            .run(&episode)
            .unwrap();
        assert_eq!(engine.calls(), 1);
        assert_eq!(report.cube.steps, 1);
        assert_eq!(report.replay.len(), 1);
        assert_eq!(report.stats.n.max, 0.4);
    }
}
