use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gkpi_algo::{DcSecurityEngine, KpiRegistry};
use gkpi_core::EvaluationConfig;

pub mod batch;
pub mod evaluate;
pub mod kpis;

fn load_config(path: Option<&Path>) -> Result<EvaluationConfig> {
    let config = EvaluationConfig::load(path).with_context(|| match path {
        Some(path) => format!("loading evaluation config '{}'", path.display()),
        None => "building default evaluation config".to_string(),
    })?;
    Ok(config)
}

fn standard_registry(config: &EvaluationConfig) -> KpiRegistry {
    let engine = Arc::new(DcSecurityEngine::from_kind(
        config.utilization.linear_solver,
    ));
    KpiRegistry::standard(config, engine)
}
