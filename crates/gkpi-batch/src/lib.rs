pub mod job;
pub mod manifest;
pub mod runner;

pub use job::{jobs_from_dirs, BatchJob, BatchJobRecord, KpiRecord};
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest};
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary};
