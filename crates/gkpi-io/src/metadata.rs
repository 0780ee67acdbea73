//! `env.json` episode metadata.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use gkpi_core::EpisodeMetadata;

pub const METADATA_FILE: &str = "env.json";

/// Read and validate `<dir>/env.json`.
pub fn load_metadata(dir: &Path) -> Result<EpisodeMetadata> {
    let path = dir.join(METADATA_FILE);
    let contents =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let metadata: EpisodeMetadata = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    metadata
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_required_fields_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"n_busbar_per_sub": 2, "n_sub": 14, "grid_file": "grid.json", "name": "l2rpn"}"#,
        )
        .unwrap();
        let meta = load_metadata(dir.path()).unwrap();
        assert_eq!(meta.n_busbar_per_sub, 2);
        assert_eq!(meta.n_sub, 14);
        assert_eq!(meta.grid_file.as_deref(), Some(Path::new("grid.json")));
    }

    #[test]
    fn missing_field_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), r#"{"n_sub": 14}"#).unwrap();
        let err = load_metadata(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("n_busbar_per_sub"));
    }

    #[test]
    fn zero_substations_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"n_busbar_per_sub": 2, "n_sub": 0}"#,
        )
        .unwrap();
        assert!(load_metadata(dir.path()).is_err());
    }
}
