//! Episode data model: asset tables, aligned time series and the action log.
//!
//! An episode is immutable once loaded. [`EpisodeStore`] is the read-side
//! capability every KPI consumes; [`InMemoryEpisode`] is the store used by
//! library callers that already hold the data.

use crate::error::{KpiError, KpiResult};
use crate::network::NetworkModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Asset classes recorded in an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Generator,
    Load,
    Storage,
    Line,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Generator,
        AssetClass::Load,
        AssetClass::Storage,
        AssetClass::Line,
    ];

    /// Static table name on disk.
    pub fn table_name(&self) -> &'static str {
        match self {
            AssetClass::Generator => "gen",
            AssetClass::Load => "load",
            AssetClass::Storage => "storage",
            AssetClass::Line => "line",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Recorded per-step quantities, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    GenP,
    GenV,
    GenBus,
    GenActualDispatch,
    GenTargetDispatch,
    GenPBeforeCurtail,
    LoadP,
    LoadQ,
    LoadBus,
    StoragePower,
    StorageBus,
    LineOrBus,
    LineExBus,
    LineRho,
    LineThermalLimit,
}

impl Quantity {
    pub const ALL: [Quantity; 15] = [
        Quantity::GenP,
        Quantity::GenV,
        Quantity::GenBus,
        Quantity::GenActualDispatch,
        Quantity::GenTargetDispatch,
        Quantity::GenPBeforeCurtail,
        Quantity::LoadP,
        Quantity::LoadQ,
        Quantity::LoadBus,
        Quantity::StoragePower,
        Quantity::StorageBus,
        Quantity::LineOrBus,
        Quantity::LineExBus,
        Quantity::LineRho,
        Quantity::LineThermalLimit,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Quantity::GenP => "gen_p",
            Quantity::GenV => "gen_v",
            Quantity::GenBus => "gen_bus",
            Quantity::GenActualDispatch => "gen_actual_dispatch",
            Quantity::GenTargetDispatch => "gen_target_dispatch",
            Quantity::GenPBeforeCurtail => "gen_p_before_curtail",
            Quantity::LoadP => "load_p",
            Quantity::LoadQ => "load_q",
            Quantity::LoadBus => "load_bus",
            Quantity::StoragePower => "storage_power",
            Quantity::StorageBus => "storage_bus",
            Quantity::LineOrBus => "line_or_bus",
            Quantity::LineExBus => "line_ex_bus",
            Quantity::LineRho => "line_rho",
            Quantity::LineThermalLimit => "line_thermal_limit",
        }
    }

    /// Asset class whose names head the table's columns.
    pub fn asset_class(&self) -> AssetClass {
        match self {
            Quantity::GenP
            | Quantity::GenV
            | Quantity::GenBus
            | Quantity::GenActualDispatch
            | Quantity::GenTargetDispatch
            | Quantity::GenPBeforeCurtail => AssetClass::Generator,
            Quantity::LoadP | Quantity::LoadQ | Quantity::LoadBus => AssetClass::Load,
            Quantity::StoragePower | Quantity::StorageBus => AssetClass::Storage,
            Quantity::LineOrBus | Quantity::LineExBus | Quantity::LineRho | Quantity::LineThermalLimit => {
                AssetClass::Line
            }
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Static attributes of one asset class, one row per asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetTable {
    pub class: Option<AssetClass>,
    pub names: Vec<String>,
    /// Extra string columns (e.g. `type`, `origin_substation_id`), aligned with `names`
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl AssetTable {
    pub fn new(class: AssetClass, names: Vec<String>) -> Self {
        Self {
            class: Some(class),
            names,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, column: &str, values: Vec<String>) -> KpiResult<Self> {
        if values.len() != self.names.len() {
            return Err(KpiError::Validation(format!(
                "attribute '{}' has {} rows, expected {}",
                column,
                values.len(),
                self.names.len()
            )));
        }
        self.attributes.insert(column.to_string(), values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn attribute(&self, column: &str) -> KpiResult<&[String]> {
        self.attributes
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                KpiError::MissingData(format!(
                    "column '{}' in asset table '{}'",
                    column,
                    self.class.map(|c| c.table_name()).unwrap_or("?")
                ))
            })
    }

    /// Value of `column` for the asset named `name`.
    pub fn attribute_of(&self, column: &str, name: &str) -> KpiResult<&str> {
        let values = self.attribute(column)?;
        let row = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| KpiError::MissingData(format!("asset '{}'", name)))?;
        Ok(values[row].as_str())
    }
}

/// One table of a recorded quantity: a time index plus one column per asset.
///
/// Values are stored column-major; `values[c][t]` is asset `c` at step `t`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesTable {
    pub time: Vec<f64>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl TimeSeriesTable {
    /// Build a table, checking that every column is aligned with the time index.
    pub fn new(time: Vec<f64>, columns: Vec<(String, Vec<f64>)>) -> KpiResult<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, series) in columns {
            if series.len() != time.len() {
                return Err(KpiError::Validation(format!(
                    "column '{}' has {} values but time index has {}",
                    name,
                    series.len(),
                    time.len()
                )));
            }
            names.push(name);
            values.push(series);
        }
        Ok(Self {
            time,
            columns: names,
            values,
        })
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column(&self, name: &str) -> KpiResult<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| KpiError::MissingData(format!("column '{}'", name)))
    }

    pub fn value(&self, name: &str, step: usize) -> KpiResult<f64> {
        let column = self.column(name)?;
        column
            .get(step)
            .copied()
            .ok_or_else(|| KpiError::MissingData(format!("step {} of column '{}'", step, name)))
    }

    /// Recorded local bus index of an asset at a step.
    ///
    /// Bus tables hold integers; anything else is a validation error.
    pub fn bus_index(&self, name: &str, step: usize) -> KpiResult<i64> {
        let value = self.value(name, step)?;
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(KpiError::Validation(format!(
                "bus index of '{}' at step {} is not an integer: {}",
                name, step, value
            )));
        }
        Ok(value as i64)
    }
}

/// Category name -> category parameters.
pub type ActionPayload = Map<String, Value>;

/// Per-step action payloads and termination flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLog {
    pub time: Vec<f64>,
    pub payloads: Vec<ActionPayload>,
    pub done: Vec<bool>,
}

impl ActionLog {
    pub fn new(time: Vec<f64>, payloads: Vec<ActionPayload>, done: Vec<bool>) -> KpiResult<Self> {
        if payloads.len() != time.len() || done.len() != time.len() {
            return Err(KpiError::Validation(format!(
                "action log misaligned: {} times, {} payloads, {} done flags",
                time.len(),
                payloads.len(),
                done.len()
            )));
        }
        Ok(Self {
            time,
            payloads,
            done,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// First step flagged `done`, if the episode ended in a blackout.
    pub fn first_done(&self) -> Option<usize> {
        self.done.iter().position(|d| *d)
    }

    /// Steps before termination; all steps when the episode never ended early.
    pub fn live_steps(&self) -> usize {
        self.first_done().unwrap_or(self.len())
    }

    /// Parse one serialized payload. Empty text is an empty action.
    pub fn parse_payload(step: usize, text: &str) -> KpiResult<ActionPayload> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(KpiError::Parse(format!(
                "action at step {} is not an object: {}",
                step, other
            ))),
            Err(err) => Err(KpiError::Parse(format!(
                "action at step {} is malformed: {}",
                step, err
            ))),
        }
    }
}

/// Grid-sizing constants stored next to the episode (`env.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub n_busbar_per_sub: usize,
    pub n_sub: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_file: Option<PathBuf>,
}

impl EpisodeMetadata {
    pub fn validate(&self) -> KpiResult<()> {
        if self.n_busbar_per_sub == 0 {
            return Err(KpiError::Validation(
                "n_busbar_per_sub must be >= 1".into(),
            ));
        }
        if self.n_sub == 0 {
            return Err(KpiError::Validation("n_sub must be >= 1".into()));
        }
        Ok(())
    }
}

/// Read access to one recorded episode.
///
/// `network` returns a fresh model each call; the caller owns and mutates it.
pub trait EpisodeStore: Send + Sync {
    fn asset_table(&self, class: AssetClass) -> KpiResult<Arc<AssetTable>>;

    fn series(&self, quantity: Quantity) -> KpiResult<Arc<TimeSeriesTable>>;

    fn action_log(&self) -> KpiResult<Arc<ActionLog>>;

    fn metadata(&self) -> KpiResult<EpisodeMetadata>;

    fn network(&self) -> KpiResult<NetworkModel>;
}

/// Episode held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEpisode {
    assets: BTreeMap<AssetClass, Arc<AssetTable>>,
    series: BTreeMap<Quantity, Arc<TimeSeriesTable>>,
    actions: Option<Arc<ActionLog>>,
    metadata: Option<EpisodeMetadata>,
    network: Option<NetworkModel>,
}

impl InMemoryEpisode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assets(mut self, class: AssetClass, table: AssetTable) -> Self {
        self.assets.insert(class, Arc::new(table));
        self
    }

    pub fn with_series(mut self, quantity: Quantity, table: TimeSeriesTable) -> Self {
        self.series.insert(quantity, Arc::new(table));
        self
    }

    pub fn with_actions(mut self, log: ActionLog) -> Self {
        self.actions = Some(Arc::new(log));
        self
    }

    pub fn with_metadata(mut self, metadata: EpisodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_network(mut self, network: NetworkModel) -> Self {
        self.network = Some(network);
        self
    }
}

impl EpisodeStore for InMemoryEpisode {
    fn asset_table(&self, class: AssetClass) -> KpiResult<Arc<AssetTable>> {
        self.assets
            .get(&class)
            .cloned()
            .ok_or_else(|| KpiError::MissingData(format!("asset table '{}'", class)))
    }

    fn series(&self, quantity: Quantity) -> KpiResult<Arc<TimeSeriesTable>> {
        self.series
            .get(&quantity)
            .cloned()
            .ok_or_else(|| KpiError::MissingData(format!("table '{}'", quantity)))
    }

    fn action_log(&self) -> KpiResult<Arc<ActionLog>> {
        self.actions
            .clone()
            .ok_or_else(|| KpiError::MissingData("table 'actions'".into()))
    }

    fn metadata(&self) -> KpiResult<EpisodeMetadata> {
        let metadata = self
            .metadata
            .clone()
            .ok_or_else(|| KpiError::MissingData("episode metadata".into()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn network(&self) -> KpiResult<NetworkModel> {
        self.network
            .clone()
            .ok_or_else(|| KpiError::MissingData("grid topology".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn time_series_rejects_misaligned_columns() {
        let err = TimeSeriesTable::new(vec![0.0, 1.0], vec![("g".into(), vec![1.0])]).unwrap_err();
        assert!(matches!(err, KpiError::Validation(_)));
    }

    #[test]
    fn bus_index_requires_integers() {
        let table = TimeSeriesTable::new(
            vec![0.0, 1.0, 2.0],
            vec![("l".into(), vec![1.0, -1.0, 1.5])],
        )
        .unwrap();
        assert_eq!(table.bus_index("l", 0).unwrap(), 1);
        assert_eq!(table.bus_index("l", 1).unwrap(), -1);
        assert!(table.bus_index("l", 2).is_err());
        assert!(matches!(
            table.bus_index("missing", 0),
            Err(KpiError::MissingData(_))
        ));
    }

    #[test]
    fn empty_payload_text_is_empty_action() {
        assert!(ActionLog::parse_payload(0, "").unwrap().is_empty());
        let payload = ActionLog::parse_payload(1, r#"{"curtail": {"gen_1": 0.5}}"#).unwrap();
        assert_eq!(payload.get("curtail"), Some(&json!({"gen_1": 0.5})));
    }

    #[test]
    fn malformed_payload_is_fatal_parse_error() {
        let err = ActionLog::parse_payload(3, "{oops").unwrap_err();
        assert!(matches!(err, KpiError::Parse(ref m) if m.contains("step 3")));
        assert!(matches!(
            ActionLog::parse_payload(4, "[1, 2]"),
            Err(KpiError::Parse(_))
        ));
    }

    #[test]
    fn first_done_and_live_steps() {
        let log = ActionLog::new(
            vec![0.0, 300.0, 600.0],
            vec![Map::new(), Map::new(), Map::new()],
            vec![false, true, true],
        )
        .unwrap();
        assert_eq!(log.first_done(), Some(1));
        assert_eq!(log.live_steps(), 1);
    }

    #[test]
    fn metadata_validation() {
        let meta: EpisodeMetadata =
            serde_json::from_str(r#"{"n_busbar_per_sub": 2, "n_sub": 14, "extra": 1}"#).unwrap();
        assert!(meta.validate().is_ok());
        assert_eq!(meta.grid_file, None);

        let bad = EpisodeMetadata {
            n_busbar_per_sub: 0,
            n_sub: 14,
            grid_file: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn in_memory_store_reports_missing_tables() {
        let store = InMemoryEpisode::new();
        assert!(matches!(
            store.series(Quantity::GenP),
            Err(KpiError::MissingData(_))
        ));
    }
}
