//! Bus-breaker network model mutated step by step during episode replay.
//!
//! Every element keeps a string identifier (engine side) and a display name
//! (episode side). Buses carry a zero-based `local_num` inside their voltage
//! level, so a recorded local bus index `k` maps to the bus with
//! `local_num == k - 1` in the element's voltage level.

use crate::episode::AssetClass;
use crate::error::{KpiError, KpiResult};
use crate::units::{Kilovolts, Megavars, Megawatts};
use serde::Serialize;

/// A voltage level of a substation. One substation may own several levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageLevel {
    pub id: String,
    pub substation_id: String,
    pub nominal_kv: Kilovolts,
}

/// A busbar section in bus-breaker topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bus {
    pub id: String,
    pub voltage_level_id: String,
    /// Zero-based position within the voltage level
    pub local_num: usize,
}

/// Where one end of an element is wired.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Terminal {
    pub bus_id: Option<String>,
    pub connected: bool,
}

impl Terminal {
    pub fn connected_to(bus_id: impl Into<String>) -> Self {
        Self {
            bus_id: Some(bus_id.into()),
            connected: true,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Bus id when the terminal is energized.
    pub fn energized_bus(&self) -> Option<&str> {
        if self.connected {
            self.bus_id.as_deref()
        } else {
            None
        }
    }

    fn assign(&mut self, assignment: &BusAssignment) {
        match assignment {
            BusAssignment::Connected(bus_id) => {
                self.bus_id = Some(bus_id.clone());
                self.connected = true;
            }
            BusAssignment::Disconnected => {
                self.bus_id = None;
                self.connected = false;
            }
        }
    }
}

/// Bus assignment produced from a recorded local bus index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusAssignment {
    Connected(String),
    Disconnected,
}

impl BusAssignment {
    pub fn is_connected(&self) -> bool {
        matches!(self, BusAssignment::Connected(_))
    }

    /// Engine bus id, empty when disconnected.
    pub fn bus_id(&self) -> &str {
        match self {
            BusAssignment::Connected(id) => id,
            BusAssignment::Disconnected => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Load {
    pub id: String,
    pub name: String,
    pub voltage_level_id: String,
    pub terminal: Terminal,
    pub p0: Megawatts,
    pub q0: Megavars,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generator {
    pub id: String,
    pub name: String,
    pub voltage_level_id: String,
    pub terminal: Terminal,
    pub energy_source: Option<String>,
    pub target_p: Megawatts,
    pub target_v: Kilovolts,
    pub voltage_regulator_on: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Battery {
    pub id: String,
    pub name: String,
    pub voltage_level_id: String,
    pub terminal: Terminal,
    pub target_p: Megawatts,
    pub target_q: Megavars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    Line,
    Transformer,
}

/// A line or two-winding transformer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub kind: BranchKind,
    pub voltage_level1_id: String,
    pub voltage_level2_id: String,
    pub terminal1: Terminal,
    pub terminal2: Terminal,
    /// Series resistance (per-unit on the model base)
    pub r_pu: f64,
    /// Series reactance (per-unit on the model base)
    pub x_pu: f64,
}

impl Branch {
    /// Both ends connected to a bus.
    pub fn is_in_service(&self) -> bool {
        self.terminal1.energized_bus().is_some() && self.terminal2.energized_bus().is_some()
    }
}

/// Outcome of mapping an episode asset name to an engine identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdResolution {
    /// An element carries this name.
    Found(String),
    /// No name matched but the name itself is an element id.
    FallbackIdentifier(String),
    NotFound,
}

impl IdResolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            IdResolution::Found(id) | IdResolution::FallbackIdentifier(id) => Some(id),
            IdResolution::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSetpoint {
    pub id: String,
    pub p0: Megawatts,
    pub q0: Megavars,
    pub bus: BusAssignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSetpoint {
    pub id: String,
    pub target_p: Megawatts,
    pub target_v: Kilovolts,
    pub voltage_regulator_on: bool,
    pub bus: BusAssignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatterySetpoint {
    pub id: String,
    pub target_p: Megawatts,
    pub target_q: Megavars,
    pub bus: BusAssignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchSetpoint {
    pub id: String,
    pub bus1: BusAssignment,
    pub bus2: BusAssignment,
}

/// Per-class setpoint vectors for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Setpoints {
    pub loads: Vec<LoadSetpoint>,
    pub generators: Vec<GeneratorSetpoint>,
    pub batteries: Vec<BatterySetpoint>,
    pub branches: Vec<BranchSetpoint>,
}

impl Setpoints {
    pub fn len(&self) -> usize {
        self.loads.len() + self.generators.len() + self.batteries.len() + self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static grid plus the mutable per-step state applied by the replayer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkModel {
    pub base_mva: f64,
    pub voltage_levels: Vec<VoltageLevel>,
    pub buses: Vec<Bus>,
    pub loads: Vec<Load>,
    pub generators: Vec<Generator>,
    pub batteries: Vec<Battery>,
    pub branches: Vec<Branch>,
}

impl Default for NetworkModel {
    fn default() -> Self {
        Self {
            base_mva: 100.0,
            voltage_levels: Vec::new(),
            buses: Vec::new(),
            loads: Vec::new(),
            generators: Vec::new(),
            batteries: Vec::new(),
            branches: Vec::new(),
        }
    }
}

impl NetworkModel {
    pub fn new(base_mva: f64) -> Self {
        Self {
            base_mva,
            ..Self::default()
        }
    }

    pub fn voltage_level(&self, id: &str) -> Option<&VoltageLevel> {
        self.voltage_levels.iter().find(|vl| vl.id == id)
    }

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.buses.iter().find(|bus| bus.id == id)
    }

    /// Nominal voltage of the level a bus belongs to.
    pub fn bus_nominal_kv(&self, bus_id: &str) -> Option<Kilovolts> {
        let bus = self.bus(bus_id)?;
        self.voltage_level(&bus.voltage_level_id)
            .map(|vl| vl.nominal_kv)
    }

    /// Pad every voltage level so that local numbers `0..n_busbar_per_sub` exist.
    ///
    /// Missing buses are named `{voltage_level}_extra_busbar_{local_num}`.
    /// Returns the number of buses created.
    pub fn ensure_busbars(&mut self, n_busbar_per_sub: usize) -> usize {
        let mut created = Vec::new();
        for vl in &self.voltage_levels {
            let count = self
                .buses
                .iter()
                .filter(|bus| bus.voltage_level_id == vl.id)
                .map(|bus| bus.local_num + 1)
                .max()
                .unwrap_or(0);
            for local_num in count..n_busbar_per_sub {
                created.push(Bus {
                    id: format!("{}_extra_busbar_{}", vl.id, local_num),
                    voltage_level_id: vl.id.clone(),
                    local_num,
                });
            }
        }
        let n = created.len();
        self.buses.extend(created);
        n
    }

    /// Bus of a voltage level with the given zero-based local number.
    pub fn bus_by_local_num(&self, voltage_level_id: &str, local_num: usize) -> Option<&Bus> {
        self.buses
            .iter()
            .find(|bus| bus.voltage_level_id == voltage_level_id && bus.local_num == local_num)
    }

    /// Element ids of one class, in model order.
    pub fn element_ids(&self, class: AssetClass) -> Vec<&str> {
        match class {
            AssetClass::Generator => self.generators.iter().map(|g| g.id.as_str()).collect(),
            AssetClass::Load => self.loads.iter().map(|l| l.id.as_str()).collect(),
            AssetClass::Storage => self.batteries.iter().map(|b| b.id.as_str()).collect(),
            AssetClass::Line => self.branches.iter().map(|b| b.id.as_str()).collect(),
        }
    }

    fn element_names(&self, class: AssetClass) -> Vec<(&str, &str)> {
        match class {
            AssetClass::Generator => self
                .generators
                .iter()
                .map(|g| (g.id.as_str(), g.name.as_str()))
                .collect(),
            AssetClass::Load => self
                .loads
                .iter()
                .map(|l| (l.id.as_str(), l.name.as_str()))
                .collect(),
            AssetClass::Storage => self
                .batteries
                .iter()
                .map(|b| (b.id.as_str(), b.name.as_str()))
                .collect(),
            AssetClass::Line => self
                .branches
                .iter()
                .map(|b| (b.id.as_str(), b.name.as_str()))
                .collect(),
        }
    }

    pub fn element_count(&self, class: AssetClass) -> usize {
        match class {
            AssetClass::Generator => self.generators.len(),
            AssetClass::Load => self.loads.len(),
            AssetClass::Storage => self.batteries.len(),
            AssetClass::Line => self.branches.len(),
        }
    }

    /// Voltage levels an element is attached to (one for injections, two for branches).
    pub fn element_voltage_levels(&self, class: AssetClass, id: &str) -> Option<(&str, Option<&str>)> {
        match class {
            AssetClass::Generator => self
                .generators
                .iter()
                .find(|g| g.id == id)
                .map(|g| (g.voltage_level_id.as_str(), None)),
            AssetClass::Load => self
                .loads
                .iter()
                .find(|l| l.id == id)
                .map(|l| (l.voltage_level_id.as_str(), None)),
            AssetClass::Storage => self
                .batteries
                .iter()
                .find(|b| b.id == id)
                .map(|b| (b.voltage_level_id.as_str(), None)),
            AssetClass::Line => self.branches.iter().find(|b| b.id == id).map(|b| {
                (
                    b.voltage_level1_id.as_str(),
                    Some(b.voltage_level2_id.as_str()),
                )
            }),
        }
    }

    /// Map an episode asset name to an element id of the given class.
    ///
    /// The first element whose name matches wins; otherwise the name is
    /// accepted if it is itself an element id.
    pub fn resolve_id(&self, class: AssetClass, name: &str) -> IdResolution {
        let elements = self.element_names(class);
        if let Some((id, _)) = elements.iter().find(|(_, n)| *n == name) {
            return IdResolution::Found((*id).to_string());
        }
        if elements.iter().any(|(id, _)| *id == name) {
            return IdResolution::FallbackIdentifier(name.to_string());
        }
        IdResolution::NotFound
    }

    /// Ids of every line and transformer, lines first.
    pub fn branch_ids(&self) -> Vec<String> {
        let lines = self.branches.iter().filter(|b| b.kind == BranchKind::Line);
        let transformers = self
            .branches
            .iter()
            .filter(|b| b.kind == BranchKind::Transformer);
        lines.chain(transformers).map(|b| b.id.clone()).collect()
    }

    fn check_bus(&self, assignment: &BusAssignment) -> KpiResult<()> {
        if let BusAssignment::Connected(bus_id) = assignment {
            if self.bus(bus_id).is_none() {
                return Err(KpiError::Network(format!("unknown bus '{}'", bus_id)));
            }
        }
        Ok(())
    }

    pub fn update_loads(&mut self, setpoints: &[LoadSetpoint]) -> KpiResult<()> {
        for sp in setpoints {
            self.check_bus(&sp.bus)?;
            let load = self
                .loads
                .iter_mut()
                .find(|l| l.id == sp.id)
                .ok_or_else(|| KpiError::Network(format!("unknown load '{}'", sp.id)))?;
            load.p0 = sp.p0;
            load.q0 = sp.q0;
            load.terminal.assign(&sp.bus);
        }
        Ok(())
    }

    pub fn update_generators(&mut self, setpoints: &[GeneratorSetpoint]) -> KpiResult<()> {
        for sp in setpoints {
            self.check_bus(&sp.bus)?;
            let gen = self
                .generators
                .iter_mut()
                .find(|g| g.id == sp.id)
                .ok_or_else(|| KpiError::Network(format!("unknown generator '{}'", sp.id)))?;
            gen.target_p = sp.target_p;
            gen.target_v = sp.target_v;
            gen.voltage_regulator_on = sp.voltage_regulator_on;
            gen.terminal.assign(&sp.bus);
        }
        Ok(())
    }

    pub fn update_batteries(&mut self, setpoints: &[BatterySetpoint]) -> KpiResult<()> {
        for sp in setpoints {
            self.check_bus(&sp.bus)?;
            let battery = self
                .batteries
                .iter_mut()
                .find(|b| b.id == sp.id)
                .ok_or_else(|| KpiError::Network(format!("unknown battery '{}'", sp.id)))?;
            battery.target_p = sp.target_p;
            battery.target_q = sp.target_q;
            battery.terminal.assign(&sp.bus);
        }
        Ok(())
    }

    pub fn update_branches(&mut self, setpoints: &[BranchSetpoint]) -> KpiResult<()> {
        for sp in setpoints {
            self.check_bus(&sp.bus1)?;
            self.check_bus(&sp.bus2)?;
            let branch = self
                .branches
                .iter_mut()
                .find(|b| b.id == sp.id)
                .ok_or_else(|| KpiError::Network(format!("unknown branch '{}'", sp.id)))?;
            branch.terminal1.assign(&sp.bus1);
            branch.terminal2.assign(&sp.bus2);
        }
        Ok(())
    }

    /// Apply a full step of setpoints. Empty classes are left untouched.
    pub fn apply(&mut self, setpoints: &Setpoints) -> KpiResult<()> {
        self.update_loads(&setpoints.loads)?;
        self.update_generators(&setpoints.generators)?;
        self.update_batteries(&setpoints.batteries)?;
        self.update_branches(&setpoints.branches)?;
        Ok(())
    }

    /// Net active injection per bus id (generation + storage - load).
    ///
    /// Battery `target_p` follows the storage convention: positive means charging.
    pub fn bus_injections(&self) -> Vec<(String, Megawatts)> {
        let mut injections: Vec<(String, Megawatts)> = self
            .buses
            .iter()
            .map(|bus| (bus.id.clone(), Megawatts(0.0)))
            .collect();
        let mut add = |bus_id: &str, p: Megawatts| {
            if let Some(entry) = injections.iter_mut().find(|(id, _)| id == bus_id) {
                entry.1 += p;
            }
        };
        for gen in &self.generators {
            if let Some(bus) = gen.terminal.energized_bus() {
                add(bus, gen.target_p);
            }
        }
        for load in &self.loads {
            if let Some(bus) = load.terminal.energized_bus() {
                add(bus, -load.p0);
            }
        }
        for battery in &self.batteries {
            if let Some(bus) = battery.terminal.energized_bus() {
                add(bus, -battery.target_p);
            }
        }
        injections
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn two_bus_model() -> NetworkModel {
        let mut model = NetworkModel::new(100.0);
        for (vl, sub) in [("VL1", "S1"), ("VL2", "S2")] {
            model.voltage_levels.push(VoltageLevel {
                id: vl.into(),
                substation_id: sub.into(),
                nominal_kv: Kilovolts(138.0),
            });
            model.buses.push(Bus {
                id: format!("{vl}_B0"),
                voltage_level_id: vl.into(),
                local_num: 0,
            });
        }
        model.loads.push(Load {
            id: "LOAD_2".into(),
            name: "load_1_0".into(),
            voltage_level_id: "VL2".into(),
            terminal: Terminal::connected_to("VL2_B0"),
            p0: Megawatts(10.0),
            q0: Megavars(1.0),
        });
        model.generators.push(Generator {
            id: "GEN_1".into(),
            name: "gen_0_0".into(),
            voltage_level_id: "VL1".into(),
            terminal: Terminal::connected_to("VL1_B0"),
            energy_source: Some("hydro".into()),
            target_p: Megawatts(10.0),
            target_v: Kilovolts(138.0),
            voltage_regulator_on: true,
        });
        model.branches.push(Branch {
            id: "L1".into(),
            name: "0_1_0".into(),
            kind: BranchKind::Line,
            voltage_level1_id: "VL1".into(),
            voltage_level2_id: "VL2".into(),
            terminal1: Terminal::connected_to("VL1_B0"),
            terminal2: Terminal::connected_to("VL2_B0"),
            r_pu: 0.01,
            x_pu: 0.1,
        });
        model
    }

    #[test]
    fn ensure_busbars_pads_each_voltage_level() {
        let mut model = two_bus_model();
        let created = model.ensure_busbars(2);
        assert_eq!(created, 2);
        let extra = model.bus_by_local_num("VL1", 1).unwrap();
        assert_eq!(extra.id, "VL1_extra_busbar_1");
        assert_eq!(model.bus_by_local_num("VL2", 0).unwrap().id, "VL2_B0");
        // idempotent
        assert_eq!(model.ensure_busbars(2), 0);
    }

    #[test]
    fn resolve_id_prefers_name_then_identifier() {
        let model = two_bus_model();
        assert_eq!(
            model.resolve_id(AssetClass::Generator, "gen_0_0"),
            IdResolution::Found("GEN_1".into())
        );
        assert_eq!(
            model.resolve_id(AssetClass::Generator, "GEN_1"),
            IdResolution::FallbackIdentifier("GEN_1".into())
        );
        assert_eq!(
            model.resolve_id(AssetClass::Load, "gen_0_0"),
            IdResolution::NotFound
        );
        assert_eq!(IdResolution::NotFound.id(), None);
    }

    #[test]
    fn disconnected_assignment_clears_bus() {
        let mut model = two_bus_model();
        model
            .update_branches(&[BranchSetpoint {
                id: "L1".into(),
                bus1: BusAssignment::Disconnected,
                bus2: BusAssignment::Connected("VL2_B0".into()),
            }])
            .unwrap();
        let branch = &model.branches[0];
        assert_eq!(branch.terminal1.bus_id, None);
        assert!(!branch.terminal1.connected);
        assert!(!branch.is_in_service());
        assert_eq!(BusAssignment::Disconnected.bus_id(), "");
    }

    #[test]
    fn unknown_bus_or_element_is_a_network_error() {
        let mut model = two_bus_model();
        let err = model
            .update_loads(&[LoadSetpoint {
                id: "LOAD_2".into(),
                p0: Megawatts(1.0),
                q0: Megavars(0.0),
                bus: BusAssignment::Connected("nowhere".into()),
            }])
            .unwrap_err();
        assert!(matches!(err, KpiError::Network(_)));

        let err = model
            .update_batteries(&[BatterySetpoint {
                id: "missing".into(),
                target_p: Megawatts(1.0),
                target_q: Megavars(0.0),
                bus: BusAssignment::Disconnected,
            }])
            .unwrap_err();
        assert!(matches!(err, KpiError::Network(_)));
    }

    #[test]
    fn bus_injections_balance_generation_and_load() {
        let model = two_bus_model();
        let injections = model.bus_injections();
        assert_eq!(injections[0], ("VL1_B0".to_string(), Megawatts(10.0)));
        assert_eq!(injections[1], ("VL2_B0".to_string(), Megawatts(-10.0)));
    }
}
