//! Evaluation settings.
//!
//! Read from a TOML file; every section and field is optional and falls back
//! to the defaults below.
//!
//! ```toml
//! [utilization]
//! divergent_current = 0.0
//! linear_solver = "faer"
//!
//! [topology]
//! count_mode = "sub_actions"
//!
//! [carbon.emission_factors]
//! thermal = 700.0
//! ```

use crate::error::{KpiError, KpiResult};
use crate::solver::SolverKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub utilization: UtilizationConfig,
    pub topology: TopologyConfig,
    pub carbon: CarbonConfig,
    pub kpis: KpiSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilizationConfig {
    /// Current (A) substituted on every branch of a case that did not converge.
    pub divergent_current: f64,
    /// Linear solver used by the built-in DC engine.
    pub linear_solver: SolverKind,
}

impl Default for UtilizationConfig {
    fn default() -> Self {
        Self {
            divergent_current: 0.0,
            linear_solver: SolverKind::Gauss,
        }
    }
}

/// How topological actions are counted per step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// One per action category present in the payload.
    #[default]
    Categories,
    /// One per asset addressed inside each category.
    SubActions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub count_mode: CountMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    /// Emission factor per generator fuel type (mass per MWh).
    pub emission_factors: BTreeMap<String, f64>,
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            emission_factors: default_emission_factors(),
        }
    }
}

pub fn default_emission_factors() -> BTreeMap<String, f64> {
    [
        ("hydro", 24.0),
        ("thermal", 655.0),
        ("solar", 45.0),
        ("nuclear", 12.0),
        ("wind", 11.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Optional restriction to a subset of KPI names. Empty means all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiSelection {
    pub enabled: Vec<String>,
}

impl KpiSelection {
    pub fn allows(&self, name: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

impl EvaluationConfig {
    pub fn from_toml_str(contents: &str) -> KpiResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        // partial emission tables override the defaults entry by entry
        let mut factors = default_emission_factors();
        factors.append(&mut config.carbon.emission_factors);
        config.carbon.emission_factors = factors;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> KpiResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|err| KpiError::Config(format!("{}: {}", path.display(), err)))
    }

    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> KpiResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> KpiResult<()> {
        let u = &self.utilization;
        if !u.divergent_current.is_finite() || u.divergent_current < 0.0 {
            return Err(KpiError::Config(format!(
                "utilization.divergent_current must be a finite value >= 0, got {}",
                u.divergent_current
            )));
        }
        for (fuel, factor) in &self.carbon.emission_factors {
            if !factor.is_finite() || *factor < 0.0 {
                return Err(KpiError::Config(format!(
                    "carbon.emission_factors.{} must be >= 0, got {}",
                    fuel, factor
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = EvaluationConfig::default();
        assert_eq!(config.utilization.divergent_current, 0.0);
        assert_eq!(config.utilization.linear_solver, SolverKind::Gauss);
        assert_eq!(config.topology.count_mode, CountMode::Categories);
        assert_eq!(config.carbon.emission_factors["thermal"], 655.0);
        assert_eq!(config.carbon.emission_factors.len(), 5);
        assert!(config.kpis.allows("Carbon Intensity"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let toml = r#"
            [topology]
            count_mode = "sub_actions"

            [carbon.emission_factors]
            thermal = 700.0
        "#;
        let config = EvaluationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.topology.count_mode, CountMode::SubActions);
        assert_eq!(config.carbon.emission_factors["thermal"], 700.0);
        assert_eq!(config.carbon.emission_factors["hydro"], 24.0);
        assert_eq!(config.utilization.linear_solver, SolverKind::Gauss);
    }

    #[test]
    fn negative_values_are_rejected() {
        let toml = "[utilization]\ndivergent_current = -1.0\n";
        assert!(matches!(
            EvaluationConfig::from_toml_str(toml),
            Err(KpiError::Config(_))
        ));
    }

    #[test]
    fn unknown_solver_is_a_config_error() {
        let toml = "[utilization]\nlinear_solver = \"cholesky\"\n";
        assert!(matches!(
            EvaluationConfig::from_toml_str(toml),
            Err(KpiError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[kpis]\nenabled = [\"Operation score\"]").unwrap();
        let config = EvaluationConfig::load(Some(file.path())).unwrap();
        assert!(config.kpis.allows("operation score"));
        assert!(!config.kpis.allows("Carbon Intensity"));
    }
}
