//! CLI error handling with user-friendly messages and exit codes.

use std::process;

use thiserror::Error;
use tilepyramid::app::AppError;
use tilepyramid::bulk::BulkError;
use tilepyramid::config::ConfigError;

/// Exit code for configuration problems.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code after Ctrl+C, following the shell convention.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start tile services: {0}")]
    Services(#[from] AppError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Services(AppError::Config(_) | AppError::Level(_)) => {
                EXIT_CONFIG
            }
            CliError::Cancelled => EXIT_INTERRUPTED,
            _ => 1,
        }
    }

    /// Prints the error and exits with its code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!("Check the configuration with: tilepyramid config show");
        }
        process::exit(self.exit_code())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<BulkError> for CliError {
    fn from(e: BulkError) -> Self {
        CliError::Download(e.to_string())
    }
}
