//! KPIs without a definition yet. Both report a single zero.

use anyhow::Result;
use gkpi_core::EpisodeStore;

use super::GridKpi;

#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantAlertAccuracyKpi;

impl GridKpi for AssistantAlertAccuracyKpi {
    fn name(&self) -> &str {
        "Assistant alert accuracy"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn evaluate(&self, _episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        Ok(vec![0.0])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TotalDecisionTimeKpi;

impl GridKpi for TotalDecisionTimeKpi {
    fn name(&self) -> &str {
        "Total decision time"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn evaluate(&self, _episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        Ok(vec![0.0])
    }
}
