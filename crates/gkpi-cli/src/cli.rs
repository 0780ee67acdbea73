use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gkpi", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate the KPIs of one episode directory
    Evaluate {
        /// Episode directory (tables, env.json, grid.*)
        #[arg(value_hint = ValueHint::DirPath)]
        episode_dir: PathBuf,
        /// Only evaluate this KPI (repeatable, case-insensitive)
        #[arg(long = "kpi")]
        kpis: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
        /// Evaluation settings (TOML)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
    /// Evaluate many episodes in parallel and write a batch manifest
    Batch {
        /// Episode directories
        #[arg(required = true, value_hint = ValueHint::DirPath)]
        episode_dirs: Vec<PathBuf>,
        /// Output directory for batch_manifest.json
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
        /// Worker threads (0 = all CPUs)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Evaluation settings (TOML)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
    /// List the available KPIs and their output fields
    Kpis,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// `Name=[v1, v2, ...]` per line
    Plain,
    /// One JSON document
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn evaluate_accepts_repeated_kpi_flags() {
        let cli = Cli::parse_from([
            "gkpi",
            "evaluate",
            "ep_0001",
            "--kpi",
            "Operation score",
            "--kpi",
            "carbon intensity",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Evaluate { kpis, format, .. } => {
                assert_eq!(kpis.len(), 2);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
