use gkpi_algo::KpiOutcome;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One episode directory to evaluate.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: String,
    pub episode_dir: PathBuf,
}

/// Values of one KPI, or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<KpiOutcome> for KpiRecord {
    fn from(outcome: KpiOutcome) -> Self {
        match outcome.result {
            Ok(values) => KpiRecord {
                name: outcome.name,
                values: Some(values),
                error: None,
            },
            Err(err) => KpiRecord {
                name: outcome.name,
                values: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

/// Manifest entry for one episode.
///
/// `status` is `ok` when every KPI produced values, `partial` when some
/// failed and `error` when the episode could not be evaluated at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub episode_dir: String,
    pub status: String,
    pub error: Option<String>,
    pub kpis: Vec<KpiRecord>,
}

impl BatchJobRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

fn job_id_for(dir: &Path, index: usize) -> String {
    match dir.file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("episode-{index}"),
    }
}

/// One job per directory, identified by the directory name.
///
/// Repeated names get a `#<n>` suffix so job ids stay unique.
pub fn jobs_from_dirs(dirs: &[PathBuf]) -> Vec<BatchJob> {
    let mut seen = std::collections::HashMap::new();
    dirs.iter()
        .enumerate()
        .map(|(index, dir)| {
            let base = job_id_for(dir, index);
            let n = seen.entry(base.clone()).or_insert(0usize);
            *n += 1;
            let job_id = if *n == 1 {
                base
            } else {
                format!("{}#{}", base, n)
            };
            BatchJob {
                job_id,
                episode_dir: dir.clone(),
            }
        })
        .collect()
}
