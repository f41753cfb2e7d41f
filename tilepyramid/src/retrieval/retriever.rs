//! Byte retrieval abstraction.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};

use super::RetrieveError;

/// Default request timeout.
pub const DEFAULT_RETRIEVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Response payload with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Retrieved {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    /// True for text or XML bodies, which tile services use to report
    /// errors.
    pub fn is_service_message(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/") || ct.contains("xml")
        })
    }
}

/// Fetches a resource.
///
/// Abstracted so the pipeline can be exercised without a network.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, url: &Url) -> Result<Retrieved, RetrieveError>;
}

/// Retriever backed by a blocking reqwest client.
pub struct ReqwestRetriever {
    client: Client,
}

impl ReqwestRetriever {
    pub fn new() -> Result<Self, RetrieveError> {
        Self::with_timeout(DEFAULT_RETRIEVE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RetrieveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrieveError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Retriever for ReqwestRetriever {
    fn retrieve(&self, url: &Url) -> Result<Retrieved, RetrieveError> {
        let response = self.client.get(url.clone()).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                RetrieveError::Unreachable {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                RetrieveError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RetrieveError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(RetrieveError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|e| RetrieveError::Http(format!("failed to read response: {e}")))?;

        Ok(Retrieved {
            bytes,
            content_type,
        })
    }
}

impl std::fmt::Debug for ReqwestRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRetriever").finish_non_exhaustive()
    }
}
