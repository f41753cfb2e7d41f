//! Reachability probes used by the network monitor.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

/// Checks whether a host answers at all.
pub trait ReachabilityProbe: Send + Sync {
    /// `target` is a host name or a full URL.
    fn is_reachable(&self, target: &str) -> bool;
}

/// Probe that issues an HTTP `HEAD` request. Any HTTP response, including
/// an error status, counts as reachable; only transport failures do not.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn probe_url(target: &str) -> String {
        if target.contains("://") {
            target.to_string()
        } else {
            format!("https://{target}/")
        }
    }
}

impl ReachabilityProbe for HttpProbe {
    fn is_reachable(&self, target: &str) -> bool {
        let url = Self::probe_url(target);
        match self.client.head(&url).send() {
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Probe reached host");
                true
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Probe failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe").finish_non_exhaustive()
    }
}
