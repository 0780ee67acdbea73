use std::path::Path;

use anyhow::{bail, Result};
use gkpi_algo::KpiOutcome;
use gkpi_batch::KpiRecord;
use gkpi_cli::OutputFormat;
use gkpi_io::DirectoryEpisodeStore;
use serde::Serialize;
use tracing::info;

use super::{load_config, standard_registry};

#[derive(Serialize)]
struct EvaluationReport<'a> {
    episode: String,
    failures: usize,
    kpis: &'a [KpiRecord],
}

/// Evaluate one episode and print the results. Returns the number of KPIs
/// that failed.
pub fn handle(
    episode_dir: &Path,
    kpis: &[String],
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<usize> {
    let mut config = load_config(config)?;
    if !kpis.is_empty() {
        let available = standard_registry(&config);
        for name in kpis {
            if available.get(name).is_none() {
                bail!(
                    "unknown KPI '{}'; available: {}",
                    name,
                    available.names().join(", ")
                );
            }
        }
        config.kpis.enabled = kpis.to_vec();
    }

    let registry = standard_registry(&config);
    if registry.is_empty() {
        bail!("no KPI selected; check [kpis] enabled in the config");
    }
    let store = DirectoryEpisodeStore::open(episode_dir)?;
    info!(
        "evaluating {} KPIs on {}",
        registry.len(),
        episode_dir.display()
    );
    let outcomes = registry.evaluate_all(&store);
    let failures = outcomes.iter().filter(|o| !o.is_ok()).count();

    match format {
        OutputFormat::Plain => print_plain(&outcomes),
        OutputFormat::Json => {
            let records: Vec<KpiRecord> = outcomes.into_iter().map(KpiRecord::from).collect();
            let report = EvaluationReport {
                episode: episode_dir.display().to_string(),
                failures,
                kpis: &records,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(failures)
}

fn print_plain(outcomes: &[KpiOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(values) => println!("{}={:?}", outcome.name, values),
            Err(err) => eprintln!("{} failed: {:#}", outcome.name, err),
        }
    }
}
