//! INI configuration file.
//!
//! `~/.tilepyramid/config.ini` overrides the built-in defaults of every
//! component. A missing file yields defaults; a malformed value is reported
//! as [`ConfigError::InvalidValue`] naming the section and key.
//!
//! ```
//! use tilepyramid::config::ConfigFile;
//!
//! let config = ConfigFile::from_ini_str("[scheduler]\npool_size = 2\n").unwrap();
//! assert_eq!(config.scheduler_config().pool_size, 2);
//! assert_eq!(config.scheduler_config().queue_depth, 10);
//! ```

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigError, CONFIG_FILE_NAME};
pub use settings::{
    default_cache_directory, AbsenceSettings, BulkSettings, CacheSettings, ConfigFile,
    NetworkSettings, SchedulerSettings, TileSettings, DEFAULT_DATASET, DEFAULT_LEVEL_ZERO_DELTA,
    DEFAULT_NUM_LEVELS,
};
pub use size::{format_size, parse_size, SizeParseError};
