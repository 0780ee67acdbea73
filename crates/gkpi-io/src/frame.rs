//! Table files and column extraction on top of polars.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::ParquetReader;

/// Extensions tried, in order, when resolving a table by name.
pub const TABLE_EXTENSIONS: [&str; 2] = ["parquet", "csv"];

/// `<dir>/<name>.parquet`, else `<dir>/<name>.csv`.
pub fn resolve_table(dir: &Path, name: &str) -> Option<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader
                .finish()
                .with_context(|| format!("reading Parquet file {}", path.display()))
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader
                .has_header(true)
                .finish()
                .with_context(|| format!("reading CSV file {}", path.display()))
        }
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}

/// Float column; nulls become NaN.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .cast(&DataType::Float64)
        .with_context(|| format!("casting column '{}' to Float64", name))?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// String column; nulls become empty strings, numbers are rendered as text.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)?
        .cast(&DataType::Utf8)
        .with_context(|| format!("casting column '{}' to Utf8", name))?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Boolean column. Accepts native booleans, integers (non-zero is true) and
/// `true`/`false` text. Nulls are false.
pub fn bool_column(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let series = df.column(name)?;
    match series.dtype() {
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect()),
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| match v.map(|s| s.trim().to_ascii_lowercase()) {
                None => Ok(false),
                Some(s) if s.is_empty() || s == "false" || s == "0" => Ok(false),
                Some(s) if s == "true" || s == "1" => Ok(true),
                Some(other) => Err(anyhow!(
                    "column '{}' row {}: '{}' is not a boolean",
                    name,
                    row,
                    other
                )),
            })
            .collect(),
        _ => Ok(f64_column(df, name)?
            .into_iter()
            .map(|v| !v.is_nan() && v != 0.0)
            .collect()),
    }
}

/// Optional text column: `None` for nulls.
pub fn optional_string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .cast(&DataType::Utf8)
        .with_context(|| format!("casting column '{}' to Utf8", name))?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}
