//! KPI reducers.
//!
//! Each KPI reads one episode through [`EpisodeStore`] and returns a
//! fixed-shape vector. KPIs share no mutable state and can be evaluated in
//! any order; [`KpiRegistry`] runs them in registration order and isolates
//! their failures.

use anyhow::Result;
use gkpi_core::EpisodeStore;

pub mod carbon;
pub mod network_utilization;
pub mod operation_score;
pub mod registry;
pub mod stubs;
pub mod topology;

pub use carbon::CarbonIntensityKpi;
pub use network_utilization::NetworkUtilizationKpi;
pub use operation_score::OperationScoreKpi;
pub use registry::{KpiOutcome, KpiRegistry};
pub use stubs::{AssistantAlertAccuracyKpi, TotalDecisionTimeKpi};
pub use topology::TopologicalActionComplexityKpi;

/// One KPI over one episode.
pub trait GridKpi: Send + Sync {
    /// Display name, also the key of the KPI in reports.
    fn name(&self) -> &str;

    /// Names of the output vector's entries, in order.
    fn fields(&self) -> &'static [&'static str];

    fn evaluate(&self, episode: &dyn EpisodeStore) -> Result<Vec<f64>>;
}

/// `(min, max, mean)` of a series; all zero when empty.
pub(crate) fn min_max_mean(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (min, max, mean)
}
