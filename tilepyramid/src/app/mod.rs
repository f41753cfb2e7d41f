//! Application wiring.
//!
//! [`TileServices`] builds the level set, caches, worker pool and network
//! monitor from a [`ConfigFile`](crate::config::ConfigFile) and shuts them
//! down in one place, so callers pass `Arc`s around instead of reaching
//! for globals.
//!
//! ```no_run
//! use tilepyramid::app::TileServices;
//! use tilepyramid::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let services = TileServices::start(&config)?;
//! let requester = services.requester();
//! // ... drive request cycles ...
//! services.shutdown();
//! # Ok::<(), tilepyramid::app::AppError>(())
//! ```

mod error;
mod services;

pub use error::AppError;
pub use services::TileServices;
