//! Grid topology file resolution and import.
//!
//! Two JSON layouts are accepted: the pandapower net that grid2op episodes
//! ship as `grid.json`, and a bus-breaker description with explicit voltage
//! levels and busbars. The layout is detected from the file contents.

mod bus_breaker;
mod pandapower;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use gkpi_core::{Diagnostics, EpisodeMetadata, NetworkModel};
use serde_json::Value;

/// Result of importing a grid file.
#[derive(Debug)]
pub struct GridImport {
    pub network: NetworkModel,
    pub diagnostics: Diagnostics,
}

/// Locate the grid file of an episode directory.
///
/// `grid_file` from the metadata wins; otherwise exactly one `grid.*` entry
/// must exist.
pub fn resolve_grid_file(dir: &Path, metadata: &EpisodeMetadata) -> Result<PathBuf> {
    if let Some(grid_file) = &metadata.grid_file {
        let path = if grid_file.is_absolute() {
            grid_file.clone()
        } else {
            dir.join(grid_file)
        };
        if !path.is_file() {
            bail!("grid file {} does not exist", path.display());
        }
        return Ok(path);
    }

    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_grid = path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some("grid");
        if is_grid {
            matches.push(path);
        }
    }
    match matches.len() {
        0 => Err(anyhow!("no grid.* file in {}", dir.display())),
        1 => Ok(matches.remove(0)),
        n => {
            matches.sort();
            Err(anyhow!(
                "{} grid files in {}: {}",
                n,
                dir.display(),
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        }
    }
}

/// Import a grid file and pad every voltage level to `n_busbar_per_sub` buses.
pub fn import_grid(path: &Path, n_busbar_per_sub: usize) -> Result<GridImport> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    if extension != "json" {
        bail!(
            "unsupported grid format '{}' for {}; expected .json",
            extension,
            path.display()
        );
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading grid file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing grid file {}", path.display()))?;
    let mut import = if pandapower::is_pandapower(&value) {
        pandapower::import(value)
    } else {
        bus_breaker::import(value)
    }
    .with_context(|| format!("importing grid file {}", path.display()))?;
    let created = import.network.ensure_busbars(n_busbar_per_sub);
    if created > 0 {
        tracing::debug!(created, n_busbar_per_sub, "padded voltage levels with extra busbars");
    }
    Ok(import)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gkpi_core::{BranchKind, IssueKind};

    const GRID: &str = r#"{
        "base_mva": 100.0,
        "voltage_levels": [
            {"id": "VL0", "substation_id": 0, "nominal_kv": 138.0, "buses": ["VL0_0"]},
            {"id": "VL1", "substation_id": "1", "nominal_kv": 138.0, "buses": ["VL1_0", "VL1_1"]}
        ],
        "loads": [{"id": "LOAD1", "name": "load_1_0", "voltage_level_id": "VL1", "bus": "VL1_0", "p0": 10.0}],
        "generators": [{"id": "GEN0", "name": "gen_0_0", "voltage_level_id": "VL0", "bus": "VL0_0",
                        "target_p": 10.0, "target_v": 140.0, "energy_source": "hydro"}],
        "lines": [{"id": "0_1_0", "voltage_level1_id": "VL0", "bus1": "VL0_0",
                   "voltage_level2_id": "VL1", "bus2": "VL1_0", "x": 0.1}],
        "transformers": [{"id": "T1", "voltage_level1_id": "VL1", "bus1": "VL1_1",
                          "voltage_level2_id": "VL1", "x": 0.05}]
    }"#;

    fn write_grid(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn imports_and_pads_busbars() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "grid.json", GRID);
        let import = import_grid(&path, 2).unwrap();
        let network = import.network;

        assert_eq!(network.voltage_levels[0].substation_id, "0");
        assert_eq!(network.buses.len(), 4);
        assert_eq!(network.bus_by_local_num("VL0", 1).unwrap().id, "VL0_extra_busbar_1");
        assert_eq!(network.bus_by_local_num("VL1", 1).unwrap().id, "VL1_1");
        assert_eq!(network.branch_ids(), vec!["0_1_0".to_string(), "T1".to_string()]);
        assert_eq!(network.branches[1].kind, BranchKind::Transformer);
        assert!(!network.branches[1].terminal2.connected);
        assert!(network.generators[0].voltage_regulator_on);
        assert_eq!(network.loads[0].name, "load_1_0");
        assert_eq!(network.branches[0].name, "0_1_0");
        assert!(import.diagnostics.is_empty());
    }

    #[test]
    fn recoverable_problems_become_diagnostics() {
        let odd = GRID
            .replace(r#", "energy_source": "hydro""#, "")
            .replace(r#""x": 0.1"#, r#""x": 0.0"#);
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "grid.json", &odd);
        let import = import_grid(&path, 2).unwrap();
        assert_eq!(import.diagnostics.of_kind(IssueKind::MissingEnergySource).count(), 1);
        let clamped: Vec<&str> = import
            .diagnostics
            .of_kind(IssueKind::NegligibleReactance)
            .map(|i| i.element_id.as_str())
            .collect();
        assert!(clamped.contains(&"0_1_0"));
    }

    const PANDAPOWER_GRID: &str = r#"{
        "_module": "pandapower.auxiliary",
        "_class": "pandapowerNet",
        "_object": {
            "bus": {"_module": "pandas.core.frame", "_class": "DataFrame",
                    "_object": "{\"columns\":[\"name\",\"vn_kv\",\"in_service\"],\"index\":[0,1],\"data\":[[null,138.0,true],[null,138.0,true]]}",
                    "orient": "split"},
            "line": {"_module": "pandas.core.frame", "_class": "DataFrame",
                     "_object": "{\"columns\":[\"from_bus\",\"to_bus\",\"length_km\",\"x_ohm_per_km\"],\"index\":[0],\"data\":[[0,1,1.0,19.0]]}",
                     "orient": "split"}
        }
    }"#;

    #[test]
    fn imports_pandapower_grid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "grid.json", PANDAPOWER_GRID);
        let network = import_grid(&path, 2).unwrap().network;

        assert_eq!(network.voltage_levels.len(), 2);
        assert_eq!(network.voltage_levels[1].substation_id, "1");
        assert_eq!(network.buses.len(), 4);
        assert_eq!(network.bus_by_local_num("vl_1", 0).unwrap().id, "bus_1");
        assert_eq!(network.bus_by_local_num("vl_1", 1).unwrap().id, "vl_1_extra_busbar_1");
        assert_eq!(network.branches[0].name, "0_1_0");
        assert!(network.branches[0].x_pu > 0.0);
    }

    #[test]
    fn bus_outside_voltage_level_is_rejected() {
        let bad = GRID.replace(r#""bus": "VL1_0", "p0""#, r#""bus": "VL0_0", "p0""#);
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "grid.json", &bad);
        let err = import_grid(&path, 2).unwrap_err();
        assert!(format!("{err:#}").contains("not in voltage level"));
    }

    #[test]
    fn resolve_requires_exactly_one_match() {
        let dir = tempfile::tempdir().unwrap();
        let meta = EpisodeMetadata {
            n_busbar_per_sub: 2,
            n_sub: 2,
            grid_file: None,
        };
        assert!(resolve_grid_file(dir.path(), &meta).is_err());

        write_grid(dir.path(), "grid.json", GRID);
        assert_eq!(
            resolve_grid_file(dir.path(), &meta).unwrap(),
            dir.path().join("grid.json")
        );

        write_grid(dir.path(), "grid.xiidm", "");
        let err = resolve_grid_file(dir.path(), &meta).unwrap_err();
        assert!(err.to_string().contains("2 grid files"));
    }

    #[test]
    fn metadata_grid_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write_grid(dir.path(), "grid.json", GRID);
        write_grid(dir.path(), "case14.json", GRID);
        let meta = EpisodeMetadata {
            n_busbar_per_sub: 2,
            n_sub: 2,
            grid_file: Some(PathBuf::from("case14.json")),
        };
        assert_eq!(
            resolve_grid_file(dir.path(), &meta).unwrap(),
            dir.path().join("case14.json")
        );
    }

    #[test]
    fn non_json_grid_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_grid(dir.path(), "grid.xiidm", "<network/>");
        assert!(import_grid(&path, 2).is_err());
    }
}
