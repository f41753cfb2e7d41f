//! TilePyramid CLI - estimate and prefetch tiles of a multi-resolution
//! pyramid into the local cache.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilepyramid::logging::{default_log_dir, init_logging, LoggingGuard, DEFAULT_LOG_FILE};

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::estimate::EstimateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilepyramid")]
#[command(version, about = "Estimate and prefetch tiles of a multi-resolution pyramid", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tilepyramid/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate how much of a region is missing from the cache
    Estimate(EstimateArgs),

    /// Download every missing tile of a region
    Download(DownloadArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Estimate(args) => {
            let _guard = start_logging(cli.log_dir)?;
            commands::estimate::run(args, config)
        }
        Commands::Download(args) => {
            let _guard = start_logging(cli.log_dir)?;
            commands::download::run(args, config)
        }
        Commands::Config { command } => commands::config::run(command, config),
    }
}

fn start_logging(log_dir: Option<PathBuf>) -> Result<LoggingGuard, CliError> {
    let dir = log_dir.unwrap_or_else(default_log_dir);
    init_logging(&dir, DEFAULT_LOG_FILE).map_err(|e| CliError::LoggingInit(e.to_string()))
}
