//! Tile retrieval: fetching bytes, building URLs, post-processing results
//! and the per-cycle requester that feeds the scheduler.

mod post;
mod requester;
mod retriever;
pub(crate) mod task;
mod url;

pub use post::{CachedTile, CachingPostProcessor, PostProcessor};
pub use requester::{CycleReport, TileRequester};
pub use retriever::{ReqwestRetriever, Retrieved, Retriever, DEFAULT_RETRIEVE_TIMEOUT};
pub use task::{is_plausible_payload, CompletionHook, FetchContext, FetchOutcome, TileFetchTask};
pub use url::{mime_for_suffix, BoundingBoxUrlBuilder, UrlBuilder};

use thiserror::Error;

/// Errors from tile retrieval.
#[derive(Debug, Clone, Error)]
pub enum RetrieveError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("host unreachable for {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("empty response from {0}")]
    EmptyBody(String),

    #[error("service returned a message instead of data: {0}")]
    ServiceMessage(String),

    #[error("no service configured for dataset {0}")]
    NoService(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("corrupt cached file: {0}")]
    Corrupt(String),
}

impl RetrieveError {
    /// True when the failure says something about connectivity rather than
    /// about the resource.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, RetrieveError::Unreachable { .. })
    }
}
