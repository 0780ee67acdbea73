//! Ordered KPI registry.

use std::sync::Arc;

use anyhow::Result;
use gkpi_core::{EpisodeStore, EvaluationConfig, PowerFlowEngine};
use tracing::{info, warn};

use super::{
    AssistantAlertAccuracyKpi, CarbonIntensityKpi, GridKpi, NetworkUtilizationKpi,
    OperationScoreKpi, TopologicalActionComplexityKpi, TotalDecisionTimeKpi,
};

/// Result of one KPI; a failure never affects the other KPIs.
#[derive(Debug)]
pub struct KpiOutcome {
    pub name: String,
    pub result: Result<Vec<f64>>,
}

impl KpiOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// KPIs in evaluation order.
///
/// Create with `KpiRegistry::new()` for empty or `KpiRegistry::standard()`
/// for the built-in set.
#[derive(Default, Clone)]
pub struct KpiRegistry {
    kpis: Vec<Arc<dyn GridKpi>>,
}

impl KpiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in KPIs, restricted to `config.kpis`.
    ///
    /// Registers, in order: carbon intensity, topological action complexity,
    /// network utilization, operation score, assistant alert accuracy and
    /// total decision time.
    pub fn standard(config: &EvaluationConfig, engine: Arc<dyn PowerFlowEngine>) -> Self {
        let count_mode = config.topology.count_mode;
        let all: Vec<Arc<dyn GridKpi>> = vec![
            Arc::new(CarbonIntensityKpi::new(
                config.carbon.emission_factors.clone(),
            )),
            Arc::new(TopologicalActionComplexityKpi::new(count_mode)),
            Arc::new(NetworkUtilizationKpi::new(
                engine,
                config.utilization.divergent_current,
            )),
            Arc::new(OperationScoreKpi::new(count_mode)),
            Arc::new(AssistantAlertAccuracyKpi),
            Arc::new(TotalDecisionTimeKpi),
        ];
        let mut registry = Self::new();
        for kpi in all {
            if config.kpis.allows(kpi.name()) {
                registry.register(kpi);
            }
        }
        registry
    }

    pub fn register(&mut self, kpi: Arc<dyn GridKpi>) {
        self.kpis.push(kpi);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GridKpi>> {
        self.kpis
            .iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.kpis.iter().map(|k| k.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn GridKpi>> {
        self.kpis.iter()
    }

    pub fn len(&self) -> usize {
        self.kpis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
    }

    /// Evaluate every KPI, in order, each independently of the others.
    pub fn evaluate_all(&self, episode: &dyn EpisodeStore) -> Vec<KpiOutcome> {
        self.kpis
            .iter()
            .map(|kpi| {
                let result = kpi.evaluate(episode);
                match &result {
                    Ok(values) => info!("{}={:?}", kpi.name(), values),
                    Err(err) => warn!("{} failed: {:#}", kpi.name(), err),
                }
                KpiOutcome {
                    name: kpi.name().to_string(),
                    result,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{scenario_a, FakeEngine};
    use gkpi_core::{config::KpiSelection, Quantity, TimeSeriesTable};

    fn registry(config: &EvaluationConfig) -> KpiRegistry {
        KpiRegistry::standard(config, Arc::new(FakeEngine::new(100.0)))
    }

    #[test]
    fn standard_order() {
        let r = registry(&EvaluationConfig::default());
        assert_eq!(
            r.names(),
            vec![
                "Carbon Intensity",
                "Topological action complexity",
                "Network utilization",
                "Operation score",
                "Assistant alert accuracy",
                "Total decision time",
            ]
        );
    }

    #[test]
    fn selection_filters_kpis() {
        let config = EvaluationConfig {
            kpis: KpiSelection {
                enabled: vec!["operation score".into(), "carbon intensity".into()],
            },
            ..EvaluationConfig::default()
        };
        let r = registry(&config);
        assert_eq!(r.names(), vec!["Carbon Intensity", "Operation score"]);
        assert!(r.get("OPERATION SCORE").is_some());
    }

    #[test]
    fn one_failure_does_not_stop_the_others() {
        // thermal limits without any line column: only network utilization fails
        let time = [0.0, 3600.0, 7200.0];
        let episode = scenario_a().unwrap().with_series(
            Quantity::LineThermalLimit,
            TimeSeriesTable::new(time.to_vec(), vec![]).unwrap(),
        );
        let outcomes = registry(&EvaluationConfig::default()).evaluate_all(&episode);
        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes[2].name, "Network utilization");
        assert!(!outcomes[2].is_ok());
        for i in [0, 1, 3, 4, 5] {
            assert!(outcomes[i].is_ok(), "{} failed", outcomes[i].name);
        }
        assert_eq!(outcomes[4].result.as_ref().unwrap(), &vec![0.0]);
    }
}
