use std::sync::Arc;

use anyhow::Result;
use gkpi_core::{EpisodeStore, PowerFlowEngine};

use super::GridKpi;
use crate::utilization::UtilizationAnalysis;

/// N and N-1 loading statistics, see [`crate::utilization`].
#[derive(Clone)]
pub struct NetworkUtilizationKpi {
    analysis: UtilizationAnalysis,
}

impl NetworkUtilizationKpi {
    pub fn new(engine: Arc<dyn PowerFlowEngine>, divergent_current: f64) -> Self {
        Self {
            analysis: UtilizationAnalysis::new(engine, divergent_current),
        }
    }
}

impl GridKpi for NetworkUtilizationKpi {
    fn name(&self) -> &str {
        "Network utilization"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "rho_n_max",
            "rho_n1_max",
            "rho_n_avg",
            "rho_n1_avg",
            "overload_n_pct",
            "overload_n1_pct",
            "n_div",
            "n1_div",
        ]
    }

    fn evaluate(&self, episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        Ok(self.analysis.run(episode)?.stats.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{scenario_d, FakeEngine};

    #[test]
    fn diverged_step_still_yields_statistics() {
        let kpi = NetworkUtilizationKpi::new(Arc::new(FakeEngine::new(100.0).fail_base_at(2)), 0.0);
        let v = kpi.evaluate(&scenario_d().unwrap()).unwrap();
        assert_eq!(v.len(), kpi.fields().len());
        assert_eq!(v[0], 0.5);
        assert!((v[1] - 0.2).abs() < 1e-12);
        assert_eq!(v[4], 0.0);
        assert_eq!(v[6], 1.0);
        assert_eq!(v[7], 0.0);
    }
}
