//! `config init|show|path`.

use std::path::Path;

use clap::Subcommand;
use tilepyramid::config::ConfigFile;

use super::common::{config_path, load_config};
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Path => {
            println!("{}", config_path(path).display());
            Ok(())
        }
    }
}

fn run_init(path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let target = config_path(path);
    if target.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            target.display()
        )));
    }
    ConfigFile::default().save_to(&target)?;
    println!("Wrote {}", target.display());
    Ok(())
}

fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    println!("; {}", config_path(path).display());
    print!("{}", config.to_ini_string());
    Ok(())
}
