//! Bus-breaker JSON grid schema:
//!
//! ```json
//! {
//!   "base_mva": 100.0,
//!   "voltage_levels": [
//!     {"id": "VL1", "substation_id": "0", "nominal_kv": 138.0, "buses": ["VL1_0"]}
//!   ],
//!   "loads": [{"id": "L1", "name": "load_0_0", "voltage_level_id": "VL1", "bus": "VL1_0", "p0": 10.0}],
//!   "generators": [], "batteries": [],
//!   "lines": [{"id": "0_1_0", "voltage_level1_id": "VL1", "bus1": "VL1_0",
//!              "voltage_level2_id": "VL2", "bus2": "VL2_0", "x": 0.1}],
//!   "transformers": []
//! }
//! ```
//!
//! Element names default to their id. A missing `bus` leaves the element
//! disconnected.

use anyhow::{bail, Context, Result};
use gkpi_core::{
    Battery, Branch, BranchKind, Bus, Diagnostics, Generator, IssueKind, Kilovolts, Load,
    Megavars, Megawatts, NetworkModel, Terminal, VoltageLevel,
};
use serde::Deserialize;
use serde_json::Value;

use super::GridImport;

#[derive(Debug, Deserialize)]
struct GridJson {
    #[serde(default = "default_base_mva")]
    base_mva: f64,
    voltage_levels: Vec<VoltageLevelJson>,
    #[serde(default)]
    loads: Vec<InjectionJson>,
    #[serde(default)]
    generators: Vec<InjectionJson>,
    #[serde(default)]
    batteries: Vec<InjectionJson>,
    #[serde(default)]
    lines: Vec<BranchJson>,
    #[serde(default)]
    transformers: Vec<BranchJson>,
}

fn default_base_mva() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct VoltageLevelJson {
    id: String,
    substation_id: Value,
    nominal_kv: Option<f64>,
    #[serde(default)]
    buses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InjectionJson {
    id: String,
    name: Option<String>,
    voltage_level_id: String,
    bus: Option<String>,
    #[serde(default)]
    p0: f64,
    #[serde(default)]
    q0: f64,
    #[serde(default)]
    target_p: f64,
    #[serde(default)]
    target_q: f64,
    #[serde(default)]
    target_v: f64,
    energy_source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchJson {
    id: String,
    name: Option<String>,
    voltage_level1_id: String,
    bus1: Option<String>,
    voltage_level2_id: String,
    bus2: Option<String>,
    #[serde(default)]
    r: f64,
    x: f64,
}

pub(crate) fn import(value: Value) -> Result<GridImport> {
    let grid: GridJson = serde_json::from_value(value).context("decoding bus-breaker grid")?;
    build_network(grid)
}

fn substation_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_network(grid: GridJson) -> Result<GridImport> {
    if !grid.base_mva.is_finite() || grid.base_mva <= 0.0 {
        bail!("base_mva must be > 0, got {}", grid.base_mva);
    }
    let mut diagnostics = Diagnostics::new();
    let mut network = NetworkModel::new(grid.base_mva);

    for vl in &grid.voltage_levels {
        if network.voltage_level(&vl.id).is_some() {
            bail!("duplicate voltage level '{}'", vl.id);
        }
        let nominal_kv = match vl.nominal_kv {
            Some(kv) if kv > 0.0 => kv,
            _ => {
                diagnostics.push(IssueKind::MissingNominalVoltage, &vl.id);
                0.0
            }
        };
        network.voltage_levels.push(VoltageLevel {
            id: vl.id.clone(),
            substation_id: substation_label(&vl.substation_id),
            nominal_kv: Kilovolts(nominal_kv),
        });
        for (local_num, bus_id) in vl.buses.iter().enumerate() {
            if network.bus(bus_id).is_some() {
                bail!("duplicate bus '{}'", bus_id);
            }
            network.buses.push(Bus {
                id: bus_id.clone(),
                voltage_level_id: vl.id.clone(),
                local_num,
            });
        }
    }

    let terminal = |network: &NetworkModel, vl: &str, bus: &Option<String>, element: &str| -> Result<Terminal> {
        if network.voltage_level(vl).is_none() {
            bail!("element '{}' references unknown voltage level '{}'", element, vl);
        }
        match bus {
            None => Ok(Terminal::disconnected()),
            Some(bus_id) => match network.bus(bus_id) {
                Some(bus) if bus.voltage_level_id == vl => Ok(Terminal::connected_to(bus_id.clone())),
                Some(_) => bail!(
                    "element '{}' bus '{}' is not in voltage level '{}'",
                    element,
                    bus_id,
                    vl
                ),
                None => bail!("element '{}' references unknown bus '{}'", element, bus_id),
            },
        }
    };

    for load in &grid.loads {
        let terminal = terminal(&network, &load.voltage_level_id, &load.bus, &load.id)?;
        network.loads.push(Load {
            id: load.id.clone(),
            name: load.name.clone().unwrap_or_else(|| load.id.clone()),
            voltage_level_id: load.voltage_level_id.clone(),
            terminal,
            p0: Megawatts(load.p0),
            q0: Megavars(load.q0),
        });
    }

    for gen in &grid.generators {
        let terminal = terminal(&network, &gen.voltage_level_id, &gen.bus, &gen.id)?;
        if gen.energy_source.is_none() {
            diagnostics.push(IssueKind::MissingEnergySource, &gen.id);
        }
        network.generators.push(Generator {
            id: gen.id.clone(),
            name: gen.name.clone().unwrap_or_else(|| gen.id.clone()),
            voltage_level_id: gen.voltage_level_id.clone(),
            terminal,
            energy_source: gen.energy_source.clone(),
            target_p: Megawatts(gen.target_p),
            target_v: Kilovolts(gen.target_v),
            voltage_regulator_on: gen.target_v > 0.0,
        });
    }

    for battery in &grid.batteries {
        let terminal = terminal(&network, &battery.voltage_level_id, &battery.bus, &battery.id)?;
        network.batteries.push(Battery {
            id: battery.id.clone(),
            name: battery.name.clone().unwrap_or_else(|| battery.id.clone()),
            voltage_level_id: battery.voltage_level_id.clone(),
            terminal,
            target_p: Megawatts(battery.target_p),
            target_q: Megavars(battery.target_q),
        });
    }

    let branches = grid
        .lines
        .iter()
        .map(|b| (BranchKind::Line, b))
        .chain(grid.transformers.iter().map(|b| (BranchKind::Transformer, b)));
    for (kind, branch) in branches {
        if network.branches.iter().any(|b| b.id == branch.id) {
            bail!("duplicate branch '{}'", branch.id);
        }
        let terminal1 = terminal(&network, &branch.voltage_level1_id, &branch.bus1, &branch.id)?;
        let terminal2 = terminal(&network, &branch.voltage_level2_id, &branch.bus2, &branch.id)?;
        if branch.x.abs() < 1e-6 {
            diagnostics.push(IssueKind::NegligibleReactance, &branch.id);
        }
        network.branches.push(Branch {
            id: branch.id.clone(),
            name: branch.name.clone().unwrap_or_else(|| branch.id.clone()),
            kind,
            voltage_level1_id: branch.voltage_level1_id.clone(),
            voltage_level2_id: branch.voltage_level2_id.clone(),
            terminal1,
            terminal2,
            r_pu: branch.r,
            x_pu: branch.x,
        });
    }

    for issue in &diagnostics.issues {
        tracing::warn!("{}", issue);
    }

    Ok(GridImport {
        network,
        diagnostics,
    })
}
