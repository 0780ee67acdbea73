//! Pandapower `grid.json` importer.
//!
//! A pandapower net serializes every element table as a pandas DataFrame in
//! split orientation, usually as a JSON string nested in the `_object` field.
//! Each pandapower bus becomes its own voltage level `vl_{bus}` with a single
//! busbar `bus_{bus}`; the substation id is the bus index, which is how
//! grid2op numbers substations of pandapower grids.
//!
//! Element ids follow the table they come from (`load_{idx}`, `gen_{idx}`,
//! `line_{idx}`, ...). Unnamed elements get the grid2op default names, e.g.
//! `load_{bus}_{idx}` or `{from_bus}_{to_bus}_{idx}` for lines, with
//! transformers numbered after the last line.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use gkpi_core::{
    Battery, Branch, BranchKind, Bus, Diagnostics, Generator, IssueKind, Kilovolts, Load,
    Megavars, Megawatts, NetworkModel, Terminal, VoltageLevel,
};
use serde::Deserialize;
use serde_json::Value;

use super::GridImport;

const PANDAPOWER_NET_CLASS: &str = "pandapowerNet";

#[derive(Debug, Deserialize)]
struct PandapowerJson {
    _class: String,
    _object: PandapowerNet,
}

#[derive(Debug, Deserialize)]
struct PandapowerNet {
    sn_mva: Option<f64>,
    bus: Option<DataFrameJson>,
    load: Option<DataFrameJson>,
    gen: Option<DataFrameJson>,
    ext_grid: Option<DataFrameJson>,
    storage: Option<DataFrameJson>,
    line: Option<DataFrameJson>,
    trafo: Option<DataFrameJson>,
    // result tables, std_types and the rest
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DataFrameJson {
    /// Split-orient content, either as a JSON string or inline.
    _object: Value,
}

#[derive(Debug, Deserialize)]
struct DataFrameContent {
    columns: Vec<String>,
    index: Vec<Value>,
    data: Vec<Vec<Value>>,
}

impl DataFrameJson {
    fn parse_content(&self, table: &str) -> Result<DataFrameContent> {
        let parsed = match &self._object {
            Value::String(raw) => serde_json::from_str(raw),
            inline => serde_json::from_value(inline.clone()),
        };
        parsed.with_context(|| format!("parsing pandapower '{}' table", table))
    }
}

/// Borrowed view with a column name lookup.
struct DataFrameView<'a> {
    index: &'a [Value],
    data: &'a [Vec<Value>],
    col_map: HashMap<&'a str, usize>,
}

impl<'a> DataFrameView<'a> {
    fn new(content: &'a DataFrameContent) -> Self {
        let col_map = content
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        Self {
            index: &content.index,
            data: &content.data,
            col_map,
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    /// Pandas index of a row, falling back to its position.
    fn row_index(&self, row: usize) -> usize {
        self.index
            .get(row)
            .and_then(value_as_usize)
            .unwrap_or(row)
    }

    fn get(&self, row: usize, col: &str) -> Option<&'a Value> {
        let col_idx = self.col_map.get(col)?;
        self.data.get(row)?.get(*col_idx)
    }

    fn f64(&self, row: usize, col: &str) -> Option<f64> {
        self.get(row, col).and_then(Value::as_f64)
    }

    fn usize(&self, row: usize, col: &str) -> Option<usize> {
        self.get(row, col).and_then(value_as_usize)
    }

    fn bool(&self, row: usize, col: &str) -> Option<bool> {
        self.get(row, col).and_then(Value::as_bool)
    }

    fn string(&self, row: usize, col: &str) -> Option<String> {
        match self.get(row, col)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn require_bus(&self, row: usize, col: &str, table: &str) -> Result<usize> {
        self.usize(row, col).ok_or_else(|| {
            anyhow!(
                "pandapower {} {} has no '{}'",
                table,
                self.row_index(row),
                col
            )
        })
    }
}

// pandas writes integer columns holding NaN as floats
fn value_as_usize(value: &Value) -> Option<usize> {
    let n = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64)
    })?;
    usize::try_from(n).ok()
}

/// Whether a parsed grid file is a serialized pandapower net.
pub(crate) fn is_pandapower(value: &Value) -> bool {
    value.get("_object").is_some()
        && value.get("_class").and_then(Value::as_str) == Some(PANDAPOWER_NET_CLASS)
}

pub(crate) fn import(value: Value) -> Result<GridImport> {
    let pp: PandapowerJson = serde_json::from_value(value).context("decoding pandapower net")?;
    if pp._class != PANDAPOWER_NET_CLASS {
        bail!("unexpected pandapower class '{}'", pp._class);
    }
    build_network(&pp._object)
}

fn voltage_level_id(bus: usize) -> String {
    format!("vl_{}", bus)
}

fn bus_id(bus: usize) -> String {
    format!("bus_{}", bus)
}

fn terminal(bus: usize, in_service: bool) -> Terminal {
    Terminal {
        bus_id: Some(bus_id(bus)),
        connected: in_service,
    }
}

fn build_network(pp: &PandapowerNet) -> Result<GridImport> {
    let base_mva = pp.sn_mva.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(100.0);
    let mut network = NetworkModel::new(base_mva);
    let mut diagnostics = Diagnostics::new();
    let mut bus_kv: HashMap<usize, f64> = HashMap::new();

    let bus_df = pp
        .bus
        .as_ref()
        .ok_or_else(|| anyhow!("pandapower net has no bus table"))?;
    let content = bus_df.parse_content("bus")?;
    let view = DataFrameView::new(&content);
    for row in 0..view.len() {
        let idx = view.row_index(row);
        let vl_id = voltage_level_id(idx);
        let vn_kv = match view.f64(row, "vn_kv") {
            Some(kv) if kv > 0.0 => kv,
            _ => {
                diagnostics.push(IssueKind::MissingNominalVoltage, &vl_id);
                0.0
            }
        };
        network.voltage_levels.push(VoltageLevel {
            id: vl_id.clone(),
            substation_id: idx.to_string(),
            nominal_kv: Kilovolts(vn_kv),
        });
        network.buses.push(Bus {
            id: bus_id(idx),
            voltage_level_id: vl_id,
            local_num: 0,
        });
        bus_kv.insert(idx, vn_kv);
    }

    // Element at an unknown bus: recorded and left out of the model.
    let known = |bus: usize, element: &str, diagnostics: &mut Diagnostics| {
        let found = bus_kv.contains_key(&bus);
        if !found {
            diagnostics.push(IssueKind::UnknownBus, element);
        }
        found
    };

    if let Some(load_df) = &pp.load {
        let content = load_df.parse_content("load")?;
        let view = DataFrameView::new(&content);
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("load_{}", idx);
            let bus = view.require_bus(row, "bus", "load")?;
            if !known(bus, &id, &mut diagnostics) {
                continue;
            }
            network.loads.push(Load {
                name: view
                    .string(row, "name")
                    .unwrap_or_else(|| format!("load_{}_{}", bus, idx)),
                id,
                voltage_level_id: voltage_level_id(bus),
                terminal: terminal(bus, view.bool(row, "in_service").unwrap_or(true)),
                p0: Megawatts(view.f64(row, "p_mw").unwrap_or(0.0)),
                q0: Megavars(view.f64(row, "q_mvar").unwrap_or(0.0)),
            });
        }
    }

    // Regular generators first so their local numbering matches grid2op.
    if let Some(gen_df) = &pp.gen {
        let content = gen_df.parse_content("gen")?;
        let view = DataFrameView::new(&content);
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("gen_{}", idx);
            let bus = view.require_bus(row, "bus", "gen")?;
            if !known(bus, &id, &mut diagnostics) {
                continue;
            }
            let energy_source = view.string(row, "type");
            if energy_source.is_none() {
                diagnostics.push(IssueKind::MissingEnergySource, &id);
            }
            let target_v = view.f64(row, "vm_pu").unwrap_or(1.0) * bus_kv[&bus];
            network.generators.push(Generator {
                name: view
                    .string(row, "name")
                    .unwrap_or_else(|| format!("gen_{}_{}", bus, idx)),
                id,
                voltage_level_id: voltage_level_id(bus),
                terminal: terminal(bus, view.bool(row, "in_service").unwrap_or(true)),
                energy_source,
                target_p: Megawatts(view.f64(row, "p_mw").unwrap_or(0.0)),
                target_v: Kilovolts(target_v),
                voltage_regulator_on: target_v > 0.0,
            });
        }
    }

    // External grids regulate voltage with no fixed active power.
    if let Some(ext_grid_df) = &pp.ext_grid {
        let content = ext_grid_df.parse_content("ext_grid")?;
        let view = DataFrameView::new(&content);
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("ext_grid_{}", idx);
            let bus = view.require_bus(row, "bus", "ext_grid")?;
            if !known(bus, &id, &mut diagnostics) {
                continue;
            }
            let target_v = view.f64(row, "vm_pu").unwrap_or(1.0) * bus_kv[&bus];
            network.generators.push(Generator {
                name: view.string(row, "name").unwrap_or_else(|| id.clone()),
                id,
                voltage_level_id: voltage_level_id(bus),
                terminal: terminal(bus, view.bool(row, "in_service").unwrap_or(true)),
                energy_source: None,
                target_p: Megawatts(0.0),
                target_v: Kilovolts(target_v),
                voltage_regulator_on: target_v > 0.0,
            });
        }
    }

    if let Some(storage_df) = &pp.storage {
        let content = storage_df.parse_content("storage")?;
        let view = DataFrameView::new(&content);
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("storage_{}", idx);
            let bus = view.require_bus(row, "bus", "storage")?;
            if !known(bus, &id, &mut diagnostics) {
                continue;
            }
            network.batteries.push(Battery {
                name: view
                    .string(row, "name")
                    .unwrap_or_else(|| format!("storage_{}_{}", bus, idx)),
                id,
                voltage_level_id: voltage_level_id(bus),
                terminal: terminal(bus, view.bool(row, "in_service").unwrap_or(true)),
                target_p: Megawatts(view.f64(row, "p_mw").unwrap_or(0.0)),
                target_q: Megavars(view.f64(row, "q_mvar").unwrap_or(0.0)),
            });
        }
    }

    let mut n_line = 0;
    if let Some(line_df) = &pp.line {
        let content = line_df.parse_content("line")?;
        let view = DataFrameView::new(&content);
        n_line = view.len();
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("line_{}", idx);
            let from_bus = view.require_bus(row, "from_bus", "line")?;
            let to_bus = view.require_bus(row, "to_bus", "line")?;
            if !known(from_bus, &id, &mut diagnostics) || !known(to_bus, &id, &mut diagnostics) {
                continue;
            }
            // per-km ohms to per-unit on the system base at the from-bus voltage
            let length_km = view.f64(row, "length_km").unwrap_or(1.0);
            let parallel = view.usize(row, "parallel").unwrap_or(1).max(1) as f64;
            let r_ohm = view.f64(row, "r_ohm_per_km").unwrap_or(0.0) * length_km / parallel;
            let x_ohm = view.f64(row, "x_ohm_per_km").unwrap_or(0.0) * length_km / parallel;
            let z_base = bus_kv[&from_bus].powi(2) / base_mva;
            let (r_pu, x_pu) = if z_base > 0.0 {
                (r_ohm / z_base, x_ohm / z_base)
            } else {
                (0.0, 0.0)
            };
            if x_pu.abs() < 1e-6 {
                diagnostics.push(IssueKind::NegligibleReactance, &id);
            }
            let in_service = view.bool(row, "in_service").unwrap_or(true);
            network.branches.push(Branch {
                name: view
                    .string(row, "name")
                    .unwrap_or_else(|| format!("{}_{}_{}", from_bus, to_bus, idx)),
                id,
                kind: BranchKind::Line,
                voltage_level1_id: voltage_level_id(from_bus),
                voltage_level2_id: voltage_level_id(to_bus),
                terminal1: terminal(from_bus, in_service),
                terminal2: terminal(to_bus, in_service),
                r_pu,
                x_pu,
            });
        }
    }

    if let Some(trafo_df) = &pp.trafo {
        let content = trafo_df.parse_content("trafo")?;
        let view = DataFrameView::new(&content);
        for row in 0..view.len() {
            let idx = view.row_index(row);
            let id = format!("trafo_{}", idx);
            let hv_bus = view.require_bus(row, "hv_bus", "trafo")?;
            let lv_bus = view.require_bus(row, "lv_bus", "trafo")?;
            if !known(hv_bus, &id, &mut diagnostics) || !known(lv_bus, &id, &mut diagnostics) {
                continue;
            }
            // vk/vkr are percentages of the transformer rating
            let sn_mva = view.f64(row, "sn_mva").filter(|s| *s > 0.0).unwrap_or(base_mva);
            let z_pu = view.f64(row, "vk_percent").unwrap_or(0.0) / 100.0;
            let r_pu = view.f64(row, "vkr_percent").unwrap_or(0.0) / 100.0;
            let x_pu = (z_pu * z_pu - r_pu * r_pu).max(0.0).sqrt();
            let scale = base_mva / sn_mva;
            if (x_pu * scale).abs() < 1e-6 {
                diagnostics.push(IssueKind::NegligibleReactance, &id);
            }
            let in_service = view.bool(row, "in_service").unwrap_or(true);
            network.branches.push(Branch {
                name: view
                    .string(row, "name")
                    .unwrap_or_else(|| format!("{}_{}_{}", hv_bus, lv_bus, n_line + idx)),
                id,
                kind: BranchKind::Transformer,
                voltage_level1_id: voltage_level_id(hv_bus),
                voltage_level2_id: voltage_level_id(lv_bus),
                terminal1: terminal(hv_bus, in_service),
                terminal2: terminal(lv_bus, in_service),
                r_pu: r_pu * scale,
                x_pu: x_pu * scale,
            });
        }
    }

    for issue in &diagnostics.issues {
        tracing::warn!("{}", issue);
    }

    Ok(GridImport {
        network,
        diagnostics,
    })
}
