//! Axewatch CLI - axewatch command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli_lib::Appearance;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Axewatch - accessibility audits that follow your components
#[derive(Parser)]
#[command(name = "axewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./axewatch.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session through the audit engine
    Replay {
        /// Session file (JSON)
        session: PathBuf,

        /// Override the configured appearance
        #[arg(long, value_enum)]
        appearance: Option<Appearance>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Override the debounce window (milliseconds)
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Report violations as log events instead of grouped console output
        #[arg(long)]
        log_only: bool,
    },
    /// Show or manage configuration
    Config {
        /// Print an example configuration
        #[arg(long)]
        example: bool,

        /// Validate the config file and exit
        #[arg(long)]
        check: bool,

        /// Print the config file path
        #[arg(long)]
        path: bool,

        /// Write the example configuration to the config path if missing
        #[arg(long)]
        init: bool,
    },
}

/// Install the fmt subscriber; the guard must live until exit
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref())?;
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Replay { session, appearance, no_color, debounce_ms, log_only } => {
            cmd::replay::run(config, &session, appearance, no_color, debounce_ms, log_only).await
        }
        Commands::Config { example, check, path, init } => {
            if example {
                cmd::config::run_example()
            } else if check {
                cmd::config::run_check(config)
            } else if path {
                cmd::config::run_path(config)
            } else if init {
                cmd::config::run_init(config)
            } else {
                cmd::config::run_list(config)
            }
        }
    }
}
