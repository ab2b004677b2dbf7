pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hrflow",
    about = "Hrflow operator CLI",
    long_about = "Operate the HR workflow engine: migrations, seed fixtures, readiness checks, and smoke validation.",
    after_help = "Examples:\n  hrflow doctor --json\n  hrflow config\n  hrflow smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic HR seed fixtures and verify their contract")]
    Seed,
    #[command(about = "Run an end-to-end workflow scenario against a fresh in-memory database")]
    Smoke,
    #[command(about = "Inspect effective configuration values")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn init_logging() {
    use hrflow_core::config::{AppConfig, LoadOptions, LogFormat};
    use tracing::Level;

    // Command payloads own stdout; diagnostics go to stderr. A broken
    // config falls back to defaults here and is reported by the command
    // itself with a proper exit code.
    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (
            config.logging.level.parse::<Level>().unwrap_or(Level::INFO),
            config.logging.format,
        ),
        Err(_) => (Level::INFO, LogFormat::Compact),
    };

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
