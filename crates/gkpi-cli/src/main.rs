use clap::Parser;
use gkpi_cli::{Cli, Commands};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // logs on stderr, results on stdout
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Evaluate {
            episode_dir,
            kpis,
            format,
            config,
        } => commands::evaluate::handle(episode_dir, kpis, *format, config.as_deref()),
        Commands::Batch {
            episode_dirs,
            out,
            threads,
            config,
        } => commands::batch::handle(episode_dirs, out, *threads, config.as_deref()),
        Commands::Kpis => commands::kpis::handle().map(|_| 0),
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{} evaluation(s) failed", failures);
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
