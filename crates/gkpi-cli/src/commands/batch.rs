use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use gkpi_batch::{jobs_from_dirs, run_batch, BatchRunnerConfig, BatchSummary};

use super::load_config;

fn print_batch_summary(summary: &BatchSummary) {
    println!(
        "batch: {} episodes, {} ok, {} with failures",
        summary.jobs.len(),
        summary.success,
        summary.failure
    );
    println!("manifest: {}", summary.manifest_path.display());
    for job in summary.jobs.iter().filter(|j| !j.is_ok()) {
        match &job.error {
            Some(error) => println!("  x {} - {}", job.job_id, error),
            None => {
                let failed: Vec<&str> = job
                    .kpis
                    .iter()
                    .filter(|k| k.error.is_some())
                    .map(|k| k.name.as_str())
                    .collect();
                println!("  x {} - failed KPIs: {}", job.job_id, failed.join(", "));
            }
        }
    }
}

/// Returns the number of episodes that did not fully evaluate.
pub fn handle(
    episode_dirs: &[PathBuf],
    out: &Path,
    threads: usize,
    config: Option<&Path>,
) -> Result<usize> {
    if episode_dirs.is_empty() {
        bail!("no episode directories given");
    }
    let config = BatchRunnerConfig {
        jobs: jobs_from_dirs(episode_dirs),
        output_root: out.to_path_buf(),
        evaluation: load_config(config)?,
        threads,
    };
    let summary = run_batch(&config)?;
    print_batch_summary(&summary);
    Ok(summary.failure)
}
