//! HTTP discovery endpoint.
//!
//! The browser exposes `GET /json/version` (browser-level transport URL) and
//! `GET /json/list` (open targets) next to the message transport. Discovery
//! runs over plain HTTP and never touches the socket.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{TargetInfo, VersionInfo};

// ============================================================================
// Discovery
// ============================================================================

/// Client for the browser's HTTP discovery endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Base URL, e.g. `http://127.0.0.1:9222`.
    endpoint: Url,
    /// Shared HTTP client.
    http: reqwest::Client,
}

impl Discovery {
    /// Creates a discovery client for an `http(s)` endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the scheme is not `http` or `https`
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self> {
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Debugging endpoint must be http or https, got: {endpoint}"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self { endpoint, http })
    }

    /// Returns the base endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches `/json/version`.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the request fails or returns a non-success status
    /// - [`Error::Protocol`] if the reply has no transport URL
    pub async fn version(&self) -> Result<VersionInfo> {
        let version: VersionInfo = self.get_json("json/version").await?;
        if version.web_socket_debugger_url.is_empty() {
            return Err(Error::protocol(
                "Discovery reply has no webSocketDebuggerUrl",
            ));
        }
        debug!(
            browser = %version.browser,
            protocol = %version.protocol_version,
            "Browser discovered"
        );
        Ok(version)
    }

    /// Fetches `/json/list`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the request fails or returns a non-success
    /// status.
    pub async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        let targets: Vec<TargetInfo> = self.get_json("json/list").await?;
        debug!(count = targets.len(), "Targets listed");
        Ok(targets)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| Error::config(format!("Invalid discovery path {path}: {e}")))?;

        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(body)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_endpoint() {
        let endpoint = Url::parse("ws://127.0.0.1:9222").unwrap();
        let err = Discovery::new(endpoint, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_keeps_endpoint() {
        let endpoint = Url::parse("http://127.0.0.1:9222").unwrap();
        let discovery = Discovery::new(endpoint.clone(), Duration::from_secs(1)).unwrap();
        assert_eq!(discovery.endpoint(), &endpoint);
    }
}
