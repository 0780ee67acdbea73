use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::job::BatchJobRecord;

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    pub jobs: Vec<BatchJobRecord>,
}

pub fn write_batch_manifest(path: &Path, manifest: &BatchManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing batch manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing batch manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_batch_manifest(path: &Path) -> Result<BatchManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening batch manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing batch manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::KpiRecord;
    use tempfile::tempdir;

    #[test]
    fn manifest_writes_and_reads_back() {
        let record = BatchJobRecord {
            job_id: "ep_0001".into(),
            episode_dir: "runs/ep_0001".into(),
            status: "partial".into(),
            error: None,
            kpis: vec![
                KpiRecord {
                    name: "Carbon Intensity".into(),
                    values: Some(vec![24.0]),
                    error: None,
                },
                KpiRecord {
                    name: "Network utilization".into(),
                    values: None,
                    error: Some("no grid.* file".into()),
                },
            ],
        };
        let manifest = BatchManifest {
            created_at: Utc::now(),
            num_jobs: 1,
            success: 0,
            failure: 1,
            jobs: vec![record.clone()],
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("batch_manifest.json");
        write_batch_manifest(&path, &manifest).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"values\": null"));

        let parsed = load_batch_manifest(&path).unwrap();
        assert_eq!(parsed.failure, 1);
        assert_eq!(parsed.jobs[0].job_id, record.job_id);
        assert_eq!(parsed.jobs[0].kpis, record.kpis);
    }
}
