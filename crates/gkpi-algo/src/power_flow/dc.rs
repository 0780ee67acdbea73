//! DC security analysis.
//!
//! Each energized island is solved with its own slack bus: the bus of the
//! first voltage-regulating generator found in the island. Islands without
//! one carry no flow. Branch flows come from angle differences,
//! `P = (θ1 - θ2) / x`, and the current at each end is `|P| / (√3·V)` with
//! `V` the nominal voltage of that end's bus.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use gkpi_core::graph_utils::{bus_graph, find_islands};
use gkpi_core::{
    BranchCurrents, CaseResult, ComputationStatus, KpiError, KpiResult, LinearSystemBackend,
    Megawatts, NetworkModel, PowerFlowEngine, SecurityAnalysis, SecurityAnalysisResult,
    SolverKind,
};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::debug;

/// Floor on branch reactance magnitude (per-unit).
const MIN_REACTANCE: f64 = 1e-6;

fn effective_reactance(x_pu: f64) -> f64 {
    x_pu.abs().max(MIN_REACTANCE)
}

/// DC load flow plus N-1 contingency loop.
#[derive(Clone)]
pub struct DcSecurityEngine {
    solver: Arc<dyn LinearSystemBackend>,
}

impl DcSecurityEngine {
    pub fn new(solver: Arc<dyn LinearSystemBackend>) -> Self {
        Self { solver }
    }

    pub fn from_kind(kind: SolverKind) -> Self {
        Self::new(kind.build_solver())
    }

    /// Voltage angles of one island, slack first at angle 0.
    ///
    /// Builds B′ over the island's buses, drops the slack row and column and
    /// solves the reduced system.
    fn island_angles(
        &self,
        network: &NetworkModel,
        island: &[usize],
        slack: usize,
        injections: &[f64],
        bus_index: &HashMap<&str, usize>,
        outaged: Option<&str>,
    ) -> Result<Vec<(usize, f64)>> {
        let mut order: Vec<usize> = Vec::with_capacity(island.len());
        order.push(slack);
        order.extend(island.iter().copied().filter(|b| *b != slack));
        if order.len() == 1 {
            return Ok(vec![(slack, 0.0)]);
        }
        let local: HashMap<usize, usize> = order.iter().enumerate().map(|(i, b)| (*b, i)).collect();

        let n = order.len();
        let mut susceptance = vec![vec![0.0; n]; n];
        for branch in &network.branches {
            if outaged == Some(branch.id.as_str()) {
                continue;
            }
            let (Some(b1), Some(b2)) = (
                branch.terminal1.energized_bus(),
                branch.terminal2.energized_bus(),
            ) else {
                continue;
            };
            let (Some(&g1), Some(&g2)) = (bus_index.get(b1), bus_index.get(b2)) else {
                continue;
            };
            if let (Some(&i), Some(&j)) = (local.get(&g1), local.get(&g2)) {
                let b = 1.0 / effective_reactance(branch.x_pu);
                susceptance[i][j] -= b;
                susceptance[j][i] -= b;
                susceptance[i][i] += b;
                susceptance[j][j] += b;
            }
        }

        let mut reduced = vec![vec![0.0; n - 1]; n - 1];
        let mut reduced_rhs = vec![0.0; n - 1];
        for i in 1..n {
            for j in 1..n {
                reduced[i - 1][j - 1] = susceptance[i][j];
            }
            reduced_rhs[i - 1] = injections[order[i]] / network.base_mva;
        }

        let solution = self.solver.solve(&reduced, &reduced_rhs)?;
        let mut angles = Vec::with_capacity(n);
        angles.push((slack, 0.0));
        for (i, bus) in order.iter().enumerate().skip(1) {
            angles.push((*bus, solution[i - 1]));
        }
        Ok(angles)
    }

    fn solve_case(&self, network: &NetworkModel, outaged: Option<&str>) -> CaseResult {
        let bus_index: HashMap<&str, usize> = network
            .buses
            .iter()
            .enumerate()
            .map(|(i, bus)| (bus.id.as_str(), i))
            .collect();
        let injections: Vec<f64> = network
            .bus_injections()
            .into_iter()
            .map(|(_, p)| if p.is_finite() { p.value() } else { 0.0 })
            .collect();
        // first regulating generator in model order picks the slack
        let slack_order: Vec<usize> = network
            .generators
            .iter()
            .filter(|g| g.voltage_regulator_on)
            .filter_map(|g| g.terminal.energized_bus())
            .filter_map(|bus| bus_index.get(bus).copied())
            .collect();

        let graph = bus_graph(network, outaged);
        let mut angles: Vec<Option<f64>> = vec![None; network.buses.len()];
        for island in find_islands(&graph) {
            let Some(slack) = slack_order.iter().copied().find(|b| island.contains(b)) else {
                continue;
            };
            match self.island_angles(network, &island, slack, &injections, &bus_index, outaged) {
                Ok(solved) => {
                    for (bus, theta) in solved {
                        angles[bus] = Some(theta);
                    }
                }
                Err(err) => {
                    debug!(
                        "DC solve failed (outage {:?}, solver {}): {}",
                        outaged,
                        self.solver.name(),
                        err
                    );
                    return CaseResult::new(ComputationStatus::Failed);
                }
            }
        }

        let mut branch_currents = BTreeMap::new();
        for branch in &network.branches {
            if outaged == Some(branch.id.as_str()) {
                continue;
            }
            let ends = (
                branch.terminal1.energized_bus(),
                branch.terminal2.energized_bus(),
            );
            let currents = match ends {
                (Some(b1), Some(b2)) => {
                    let theta = |bus: &str| bus_index.get(bus).and_then(|i| angles[*i]);
                    match (theta(b1), theta(b2)) {
                        (Some(t1), Some(t2)) => {
                            let flow = Megawatts(
                                (t1 - t2) / effective_reactance(branch.x_pu) * network.base_mva,
                            );
                            let kv = |bus: &str| network.bus_nominal_kv(bus).unwrap_or_default();
                            BranchCurrents {
                                i1: flow.line_current(kv(b1)),
                                i2: flow.line_current(kv(b2)),
                            }
                        }
                        _ => BranchCurrents::default(),
                    }
                }
                _ => BranchCurrents::default(),
            };
            branch_currents.insert(branch.id.clone(), currents);
        }

        CaseResult {
            status: ComputationStatus::Converged,
            branch_currents,
        }
    }
}

fn check_base(network: &NetworkModel) -> KpiResult<()> {
    if !network.base_mva.is_finite() || network.base_mva <= 0.0 {
        return Err(KpiError::Validation(format!(
            "base_mva must be > 0, got {}",
            network.base_mva
        )));
    }
    Ok(())
}

/// Keep only the monitored branches of a case.
fn monitored_only(mut case: CaseResult, monitored: &HashSet<&str>) -> CaseResult {
    case.branch_currents
        .retain(|id, _| monitored.contains(id.as_str()));
    case
}

impl PowerFlowEngine for DcSecurityEngine {
    fn name(&self) -> &str {
        "dc"
    }

    fn solve(&self, network: &NetworkModel) -> KpiResult<CaseResult> {
        check_base(network)?;
        Ok(self.solve_case(network, None))
    }

    fn solve_with_contingencies(
        &self,
        network: &NetworkModel,
        analysis: &SecurityAnalysis,
    ) -> KpiResult<SecurityAnalysisResult> {
        check_base(network)?;
        let monitored: HashSet<&str> = analysis
            .monitored_branches
            .iter()
            .map(String::as_str)
            .collect();
        let pre_contingency = monitored_only(self.solve_case(network, None), &monitored);

        #[cfg(feature = "rayon")]
        let cases = analysis.contingencies.par_iter();
        #[cfg(not(feature = "rayon"))]
        let cases = analysis.contingencies.iter();

        let post_contingency = cases
            .map(|contingency| {
                let case = self.solve_case(network, Some(&contingency.element_id));
                (contingency.id.clone(), monitored_only(case, &monitored))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        Ok(SecurityAnalysisResult {
            pre_contingency,
            post_contingency,
        })
    }
}
