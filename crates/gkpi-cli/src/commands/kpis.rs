use std::io::{self, Write};

use anyhow::Result;
use gkpi_core::EvaluationConfig;
use tabwriter::TabWriter;

use super::standard_registry;

pub fn handle() -> Result<()> {
    let registry = standard_registry(&EvaluationConfig::default());
    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "KPI\tFIELDS")?;
    for kpi in registry.iter() {
        writeln!(tw, "{}\t{}", kpi.name(), kpi.fields().join(", "))?;
    }
    tw.flush()?;
    Ok(())
}
