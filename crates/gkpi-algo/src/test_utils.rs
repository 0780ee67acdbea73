//! Fixtures shared by unit and integration tests.
//!
//! The reference grid has two substations joined by two parallel lines, one
//! hydro generator and one load, padded to two busbars per substation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use gkpi_core::{
    ActionLog, ActionPayload, AssetClass, AssetTable, Branch, BranchCurrents, BranchKind, Bus,
    CaseResult, ComputationStatus, EpisodeMetadata, Generator, InMemoryEpisode, Kilovolts,
    KpiResult, Load, Megavars, Megawatts, NetworkModel, PowerFlowEngine, Quantity,
    SecurityAnalysis, SecurityAnalysisResult, Terminal, TimeSeriesTable, VoltageLevel,
};
use serde_json::Value;

pub const N_BUSBAR_PER_SUB: usize = 2;
pub const N_SUB: usize = 2;

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn series(time: &[f64], columns: Vec<(&str, Vec<f64>)>) -> KpiResult<TimeSeriesTable> {
    TimeSeriesTable::new(
        time.to_vec(),
        columns
            .into_iter()
            .map(|(name, values)| (name.to_string(), values))
            .collect(),
    )
}

/// Every column holds `value` at every step.
pub fn constant(time: &[f64], columns: &[&str], value: f64) -> KpiResult<TimeSeriesTable> {
    series(
        time,
        columns.iter().map(|c| (*c, vec![value; time.len()])).collect(),
    )
}

/// JSON object as an action payload; anything else is an empty action.
pub fn payload(value: Value) -> ActionPayload {
    match value {
        Value::Object(map) => map,
        _ => ActionPayload::new(),
    }
}

/// Empty actions at every step, never done.
pub fn quiet_log(time: &[f64]) -> ActionLog {
    ActionLog {
        time: time.to_vec(),
        payloads: vec![ActionPayload::new(); time.len()],
        done: vec![false; time.len()],
    }
}

pub fn two_bus_network() -> NetworkModel {
    let mut model = NetworkModel::new(100.0);
    for sub in 0..N_SUB {
        let vl = format!("VL{sub}");
        model.voltage_levels.push(VoltageLevel {
            id: vl.clone(),
            substation_id: sub.to_string(),
            nominal_kv: Kilovolts(20.0),
        });
        model.buses.push(Bus {
            id: format!("{vl}_0"),
            voltage_level_id: vl,
            local_num: 0,
        });
    }
    model.loads.push(Load {
        id: "LOAD_1".into(),
        name: "load_1_0".into(),
        voltage_level_id: "VL1".into(),
        terminal: Terminal::connected_to("VL1_0"),
        p0: Megawatts(10.0),
        q0: Megavars(1.0),
    });
    model.generators.push(Generator {
        id: "GEN_0".into(),
        name: "gen_0_0".into(),
        voltage_level_id: "VL0".into(),
        terminal: Terminal::connected_to("VL0_0"),
        energy_source: Some("hydro".into()),
        target_p: Megawatts(10.0),
        target_v: Kilovolts(20.0),
        voltage_regulator_on: true,
    });
    for (id, name) in [("L0", "0_1_0"), ("L1", "0_1_1")] {
        model.branches.push(Branch {
            id: id.into(),
            name: name.into(),
            kind: BranchKind::Line,
            voltage_level1_id: "VL0".into(),
            voltage_level2_id: "VL1".into(),
            terminal1: Terminal::connected_to("VL0_0"),
            terminal2: Terminal::connected_to("VL1_0"),
            r_pu: 0.01,
            x_pu: 0.1,
        });
    }
    model.ensure_busbars(N_BUSBAR_PER_SUB);
    model
}

/// A quiet episode on [`two_bus_network`]: 10 MW hydro feeding a 10 MW load,
/// no action, no curtailment, lines at rho 0.5 under a 500 A limit.
pub fn two_bus_episode(time: &[f64]) -> KpiResult<InMemoryEpisode> {
    let gens = ["gen_0_0"];
    let loads = ["load_1_0"];
    let lines = ["0_1_0", "0_1_1"];

    let gen_table = AssetTable::new(AssetClass::Generator, names(&gens))
        .with_attribute("type", names(&["hydro"]))?;
    let line_table = AssetTable::new(AssetClass::Line, names(&lines))
        .with_attribute("origin_substation_id", names(&["0", "0"]))?
        .with_attribute("extremity_substation_id", names(&["1", "1"]))?;

    Ok(InMemoryEpisode::new()
        .with_assets(AssetClass::Generator, gen_table)
        .with_assets(AssetClass::Load, AssetTable::new(AssetClass::Load, names(&loads)))
        .with_assets(AssetClass::Line, line_table)
        .with_series(Quantity::GenP, constant(time, &gens, 10.0)?)
        .with_series(Quantity::GenV, constant(time, &gens, 20.0)?)
        .with_series(Quantity::GenBus, constant(time, &gens, 1.0)?)
        .with_series(Quantity::GenActualDispatch, constant(time, &gens, 10.0)?)
        .with_series(Quantity::GenTargetDispatch, constant(time, &gens, 10.0)?)
        .with_series(Quantity::GenPBeforeCurtail, constant(time, &gens, 10.0)?)
        .with_series(Quantity::LoadP, constant(time, &loads, 10.0)?)
        .with_series(Quantity::LoadQ, constant(time, &loads, 1.0)?)
        .with_series(Quantity::LoadBus, constant(time, &loads, 1.0)?)
        .with_series(Quantity::LineOrBus, constant(time, &lines, 1.0)?)
        .with_series(Quantity::LineExBus, constant(time, &lines, 1.0)?)
        .with_series(Quantity::LineRho, constant(time, &lines, 0.5)?)
        .with_series(Quantity::LineThermalLimit, constant(time, &lines, 500.0)?)
        .with_actions(quiet_log(time))
        .with_metadata(EpisodeMetadata {
            n_busbar_per_sub: N_BUSBAR_PER_SUB,
            n_sub: N_SUB,
            grid_file: None,
        })
        .with_network(two_bus_network()))
}

/// Hourly steps, constant 10 MW hydro dispatch, nothing curtailed.
pub fn scenario_a() -> KpiResult<InMemoryEpisode> {
    two_bus_episode(&[0.0, 3600.0, 7200.0])
}

/// One redispatch at step 1, one curtailment at step 2.
pub fn scenario_b() -> KpiResult<InMemoryEpisode> {
    let time = [0.0, 300.0, 600.0];
    let mut log = quiet_log(&time);
    log.payloads[1] = payload(serde_json::json!({"redispatch": {"gen_0_0": 1.0}}));
    log.payloads[2] = payload(serde_json::json!({"curtail": {"gen_0_0": 0.5}}));
    Ok(two_bus_episode(&time)?.with_actions(log))
}

/// Blackout at step 2 after a 900 s interval with 5 MW of load.
pub fn scenario_c() -> KpiResult<InMemoryEpisode> {
    let time = [0.0, 900.0, 1800.0];
    let mut log = quiet_log(&time);
    log.done[2] = true;
    Ok(two_bus_episode(&time)?
        .with_series(Quantity::LoadP, constant(&time, &["load_1_0"], 5.0)?)
        .with_actions(log))
}

/// Five steps for the utilization engine; pair with an engine that fails
/// the base case of step 2.
pub fn scenario_d() -> KpiResult<InMemoryEpisode> {
    two_bus_episode(&[0.0, 300.0, 600.0, 900.0, 1200.0])
}

/// Scripted [`PowerFlowEngine`].
///
/// Every converged case reports `current` at both ends of every monitored
/// branch except the outaged one. Failures are scripted per call index,
/// which equals the step index when steps are solved in order.
#[derive(Debug, Default)]
pub struct FakeEngine {
    current: f64,
    failing_base: BTreeSet<usize>,
    failing_contingencies: BTreeSet<(usize, String)>,
    missing_contingencies: BTreeSet<(usize, String)>,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(current: f64) -> Self {
        Self {
            current,
            ..Self::default()
        }
    }

    pub fn fail_base_at(mut self, call: usize) -> Self {
        self.failing_base.insert(call);
        self
    }

    pub fn fail_contingency_at(mut self, call: usize, contingency_id: &str) -> Self {
        self.failing_contingencies
            .insert((call, contingency_id.to_string()));
        self
    }

    /// Leave a contingency out of the result entirely.
    pub fn omit_contingency_at(mut self, call: usize, contingency_id: &str) -> Self {
        self.missing_contingencies
            .insert((call, contingency_id.to_string()));
        self
    }

    /// Security analyses run so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn case(&self, converged: bool, monitored: &[String], outaged: Option<&str>) -> CaseResult {
        if !converged {
            return CaseResult::new(ComputationStatus::Failed);
        }
        monitored
            .iter()
            .filter(|id| Some(id.as_str()) != outaged)
            .fold(CaseResult::new(ComputationStatus::Converged), |case, id| {
                case.with_current(id.clone(), BranchCurrents::new(self.current, self.current))
            })
    }
}

impl PowerFlowEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn solve(&self, network: &NetworkModel) -> KpiResult<CaseResult> {
        Ok(self.case(true, &network.branch_ids(), None))
    }

    fn solve_with_contingencies(
        &self,
        _network: &NetworkModel,
        analysis: &SecurityAnalysis,
    ) -> KpiResult<SecurityAnalysisResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let base_ok = !self.failing_base.contains(&call);
        let pre_contingency = self.case(base_ok, &analysis.monitored_branches, None);
        let post_contingency = analysis
            .contingencies
            .iter()
            .filter(|c| !self.missing_contingencies.contains(&(call, c.id.clone())))
            .map(|c| {
                let ok = !self.failing_contingencies.contains(&(call, c.id.clone()));
                (
                    c.id.clone(),
                    self.case(ok, &analysis.monitored_branches, Some(&c.element_id)),
                )
            })
            .collect();
        Ok(SecurityAnalysisResult {
            pre_contingency,
            post_contingency,
        })
    }
}
