//! Application error types.

use thiserror::Error;

use crate::bulk::BulkError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::executor::SchedulerError;
use crate::level::LevelError;
use crate::retrieval::RetrieveError;

/// Errors raised while starting services or running top-level operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid level set: {0}")]
    Level(#[from] LevelError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to start task scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("retrieval setup failed: {0}")]
    Retrieve(#[from] RetrieveError),

    #[error("bulk download error: {0}")]
    Bulk(#[from] BulkError),
}
