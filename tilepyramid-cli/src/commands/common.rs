//! Argument types shared across commands.

use std::path::{Path, PathBuf};

use clap::Args;
use tilepyramid::config::ConfigFile;
use tilepyramid::geo::Sector;

use crate::error::CliError;

/// Region and resolution selection.
#[derive(Debug, Clone, Args)]
pub struct RegionArgs {
    /// Region as min_lat,min_lon,max_lat,max_lon in degrees
    #[arg(long, value_parser = parse_sector, allow_hyphen_values = true)]
    pub sector: Sector,

    /// Finest tile extent wanted, in degrees
    #[arg(long)]
    pub resolution: f64,
}

impl RegionArgs {
    pub fn validate(&self) -> Result<(), CliError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(CliError::Config(format!(
                "resolution must be a positive number of degrees, got {}",
                self.resolution
            )));
        }
        Ok(())
    }
}

fn parse_sector(s: &str) -> Result<Sector, String> {
    Sector::parse(s).map_err(|e| e.to_string())
}

/// Loads the file given with `--config`, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// The file `--config` points at, or the default location.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(tilepyramid::config::config_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sector() {
        let sector = parse_sector("-10,20,30,40").unwrap();
        assert_eq!(sector, Sector::new(-10.0, 30.0, 20.0, 40.0).unwrap());
        assert!(parse_sector("1,2,3").is_err());
    }

    #[test]
    fn test_validate_resolution() {
        let sector = Sector::full_sphere();
        assert!(RegionArgs { sector, resolution: 1.0 }.validate().is_ok());
        assert!(RegionArgs { sector, resolution: 0.0 }.validate().is_err());
        assert!(RegionArgs { sector, resolution: f64::NAN }.validate().is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[scheduler]\npool_size = 3\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.scheduler.pool_size, 3);
        assert_eq!(config_path(Some(&path)), path);
    }
}
