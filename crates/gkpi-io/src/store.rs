//! Episode directory reader.
//!
//! One directory per episode: static asset tables (`gen`, `load`, `storage`,
//! `line`), one time-series table per quantity, the `actions` table, `env.json`
//! and a `grid.*` topology file. Tables are Parquet or CSV.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::{bail, Context, Result};
use gkpi_core::{
    ActionLog, AssetClass, AssetTable, EpisodeMetadata, EpisodeStore, KpiError, KpiResult,
    NetworkModel, Quantity, TimeSeriesTable,
};
use polars::prelude::DataFrame;

use crate::frame::{
    bool_column, f64_column, has_column, optional_string_column, read_frame, resolve_table,
    string_column,
};
use crate::grid::{import_grid, resolve_grid_file};
use crate::metadata::load_metadata;

pub const ACTIONS_TABLE: &str = "actions";
pub const TIME_COLUMN: &str = "time";

/// Attribute columns kept per asset class, with accepted aliases.
fn attribute_columns(class: AssetClass) -> &'static [(&'static str, &'static [&'static str])] {
    match class {
        AssetClass::Generator => &[("type", &["gen_type"])],
        AssetClass::Line => &[
            ("origin_substation_id", &["line_or_to_subid"]),
            ("extremity_substation_id", &["line_ex_to_subid"]),
        ],
        AssetClass::Load | AssetClass::Storage => &[],
    }
}

/// [`EpisodeStore`] backed by an episode directory.
///
/// Tables are read on first use and cached for the lifetime of the store.
#[derive(Debug)]
pub struct DirectoryEpisodeStore {
    dir: PathBuf,
    assets: RwLock<HashMap<AssetClass, Arc<AssetTable>>>,
    series: RwLock<HashMap<Quantity, Arc<TimeSeriesTable>>>,
    actions: RwLock<Option<Arc<ActionLog>>>,
}

impl DirectoryEpisodeStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            bail!("episode directory {} does not exist", dir.display());
        }
        Ok(Self {
            dir,
            assets: RwLock::new(HashMap::new()),
            series: RwLock::new(HashMap::new()),
            actions: RwLock::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn frame(&self, table: &str) -> KpiResult<DataFrame> {
        let path = resolve_table(&self.dir, table).ok_or_else(|| {
            KpiError::MissingData(format!("table '{}' in {}", table, self.dir.display()))
        })?;
        tracing::debug!(table, path = %path.display(), "reading episode table");
        read_frame(&path).map_err(|err| KpiError::Parse(format!("{err:#}")))
    }

    fn read_assets(&self, class: AssetClass) -> Result<AssetTable> {
        let df = self.frame(class.table_name())?;
        let names = string_column(&df, "name")
            .with_context(|| format!("asset table '{}'", class.table_name()))?;
        let mut table = AssetTable::new(class, names);
        for (column, aliases) in attribute_columns(class) {
            let source = std::iter::once(*column)
                .chain(aliases.iter().copied())
                .find(|c| has_column(&df, c));
            if let Some(source) = source {
                let values = string_column(&df, source)?;
                table = table.with_attribute(column, values)?;
            }
        }
        Ok(table)
    }

    fn read_series(&self, quantity: Quantity) -> Result<TimeSeriesTable> {
        let df = self.frame(quantity.table_name())?;
        if !has_column(&df, TIME_COLUMN) {
            return Err(KpiError::MissingData(format!(
                "column '{}' in table '{}'",
                TIME_COLUMN,
                quantity.table_name()
            ))
            .into());
        }
        let time = f64_column(&df, TIME_COLUMN)?;
        let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
        for name in df.get_column_names() {
            if name == TIME_COLUMN {
                continue;
            }
            let values = f64_column(&df, name)
                .with_context(|| format!("table '{}'", quantity.table_name()))?;
            columns.push((name.to_string(), values));
        }
        Ok(TimeSeriesTable::new(time, columns)?)
    }

    fn read_actions(&self) -> Result<ActionLog> {
        let df = self.frame(ACTIONS_TABLE)?;
        for column in [TIME_COLUMN, "action", "done"] {
            if !has_column(&df, column) {
                return Err(KpiError::MissingData(format!(
                    "column '{}' in table '{}'",
                    column, ACTIONS_TABLE
                ))
                .into());
            }
        }
        let time = f64_column(&df, TIME_COLUMN)?;
        let done = bool_column(&df, "done")?;
        let payloads = optional_string_column(&df, "action")?
            .into_iter()
            .enumerate()
            .map(|(step, text)| ActionLog::parse_payload(step, text.as_deref().unwrap_or("")))
            .collect::<KpiResult<Vec<_>>>()?;
        Ok(ActionLog::new(time, payloads, done)?)
    }
}

/// Prefer the typed error when the chain carries one.
fn into_kpi_error(err: anyhow::Error) -> KpiError {
    let err = match err.downcast::<KpiError>() {
        Ok(kpi) => return kpi,
        Err(other) => other,
    };
    if let Some(kind) = err.downcast_ref::<std::io::Error>().map(|e| e.kind()) {
        return KpiError::Io(std::io::Error::new(kind, format!("{err:#}")));
    }
    KpiError::Parse(format!("{err:#}"))
}

impl EpisodeStore for DirectoryEpisodeStore {
    fn asset_table(&self, class: AssetClass) -> KpiResult<Arc<AssetTable>> {
        if let Some(table) = self.assets.read().ok().and_then(|c| c.get(&class).cloned()) {
            return Ok(table);
        }
        let table = Arc::new(self.read_assets(class).map_err(into_kpi_error)?);
        if let Ok(mut cache) = self.assets.write() {
            cache.insert(class, table.clone());
        }
        Ok(table)
    }

    fn series(&self, quantity: Quantity) -> KpiResult<Arc<TimeSeriesTable>> {
        if let Some(table) = self.series.read().ok().and_then(|c| c.get(&quantity).cloned()) {
            return Ok(table);
        }
        let table = Arc::new(self.read_series(quantity).map_err(into_kpi_error)?);
        if let Ok(mut cache) = self.series.write() {
            cache.insert(quantity, table.clone());
        }
        Ok(table)
    }

    fn action_log(&self) -> KpiResult<Arc<ActionLog>> {
        if let Some(log) = self.actions.read().ok().and_then(|c| c.clone()) {
            return Ok(log);
        }
        let log = Arc::new(self.read_actions().map_err(into_kpi_error)?);
        if let Ok(mut cache) = self.actions.write() {
            *cache = Some(log.clone());
        }
        Ok(log)
    }

    fn metadata(&self) -> KpiResult<EpisodeMetadata> {
        load_metadata(&self.dir).map_err(into_kpi_error)
    }

    fn network(&self) -> KpiResult<NetworkModel> {
        let metadata = self.metadata()?;
        let path = resolve_grid_file(&self.dir, &metadata)
            .map_err(|err| KpiError::Config(format!("{err:#}")))?;
        let import = import_grid(&path, metadata.n_busbar_per_sub)
            .map_err(|err| KpiError::Network(format!("{err:#}")))?;
        Ok(import.network)
    }
}
