use crate::job::{BatchJob, BatchJobRecord, KpiRecord};
use crate::manifest::{write_batch_manifest, BatchManifest};
use anyhow::{Context, Result};
use chrono::Utc;
use gkpi_algo::{DcSecurityEngine, KpiRegistry};
use gkpi_core::EvaluationConfig;
use gkpi_io::DirectoryEpisodeStore;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const MANIFEST_FILE: &str = "batch_manifest.json";

pub struct BatchRunnerConfig {
    pub jobs: Vec<BatchJob>,
    pub output_root: PathBuf,
    pub evaluation: EvaluationConfig,
    /// Worker threads; 0 uses every available CPU.
    pub threads: usize,
}

pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

fn thread_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Evaluate every job on a dedicated pool and write `batch_manifest.json`
/// under `output_root`.
///
/// Episodes share nothing: each job opens its own store, network model and
/// registry. A failing episode is recorded in the manifest and does not stop
/// the batch.
pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating batch output root '{}'",
            config.output_root.display()
        )
    })?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count(config.threads))
        .build()
        .context("building Rayon thread pool for batch runs")?;

    let job_records: Vec<BatchJobRecord> = pool.install(|| {
        config
            .jobs
            .par_iter()
            .map(|job| run_job(job, &config.evaluation))
            .collect()
    });

    let success = job_records.iter().filter(|record| record.is_ok()).count();
    let failure = job_records.len() - success;
    info!(success, failure, "batch finished");

    let manifest = BatchManifest {
        created_at: Utc::now(),
        num_jobs: job_records.len(),
        success,
        failure,
        jobs: job_records.clone(),
    };
    let manifest_path = config.output_root.join(MANIFEST_FILE);
    write_batch_manifest(&manifest_path, &manifest)?;
    Ok(BatchSummary {
        success,
        failure,
        manifest_path,
        jobs: job_records,
    })
}

fn run_job(job: &BatchJob, evaluation: &EvaluationConfig) -> BatchJobRecord {
    let runner = || -> Result<Vec<KpiRecord>> {
        let store = DirectoryEpisodeStore::open(&job.episode_dir)?;
        let engine = Arc::new(DcSecurityEngine::from_kind(
            evaluation.utilization.linear_solver,
        ));
        let registry = KpiRegistry::standard(evaluation, engine);
        Ok(registry
            .evaluate_all(&store)
            .into_iter()
            .map(KpiRecord::from)
            .collect())
    };

    let (status, error, kpis) = match runner() {
        Ok(kpis) if kpis.iter().all(|k| k.error.is_none()) => ("ok", None, kpis),
        Ok(kpis) => {
            warn!("batch job {}: some KPIs failed", job.job_id);
            ("partial", None, kpis)
        }
        Err(err) => {
            warn!("batch job {} failed: {err:#}", job.job_id);
            ("error", Some(format!("{err:#}")), Vec::new())
        }
    };
    BatchJobRecord {
        job_id: job.job_id.clone(),
        episode_dir: job.episode_dir.display().to_string(),
        status: status.to_string(),
        error,
        kpis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::jobs_from_dirs;
    use tempfile::tempdir;

    #[test]
    fn zero_threads_means_all_cpus() {
        assert_eq!(thread_count(0), num_cpus::get());
        assert_eq!(thread_count(3), 3);
    }

    #[test]
    fn missing_episode_is_recorded_not_fatal() {
        let out = tempdir().unwrap();
        let config = BatchRunnerConfig {
            jobs: jobs_from_dirs(&[out.path().join("does_not_exist")]),
            output_root: out.path().join("results"),
            evaluation: EvaluationConfig::default(),
            threads: 1,
        };
        let summary = run_batch(&config).unwrap();
        assert_eq!(summary.success, 0);
        assert_eq!(summary.failure, 1);
        assert_eq!(summary.jobs[0].status, "error");
        assert!(summary.jobs[0].kpis.is_empty());
        assert!(summary.manifest_path.exists());
    }
}
