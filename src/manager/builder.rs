//! Builder pattern for manager configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use chart_cdp::ChartManager;
//!
//! # async fn example() -> chart_cdp::Result<()> {
//! let manager = ChartManager::builder()
//!     .endpoint("http://127.0.0.1:9222")
//!     .url_filter("tradingview.com")
//!     .call_timeout(Duration::from_secs(15))
//!     .build()?;
//!
//! manager.connect().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::chart::ChartPattern;
use crate::error::{Error, Result};
use crate::transport::{CdpClient, ProtocolClient};

use super::config::ManagerConfig;
use super::core::{ChartManager, ManagerSettings};

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for configuring a [`ChartManager`].
///
/// Use [`ChartManager::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ManagerBuilder {
    /// Plain configuration values.
    config: ManagerConfig,
    /// Injected protocol client.
    client: Option<Arc<dyn ProtocolClient>>,
}

impl fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("config", &self.config)
            .field("custom_client", &self.client.is_some())
            .finish()
    }
}

impl ManagerBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP discovery endpoint (e.g. `http://127.0.0.1:9222`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the substring a tab URL must contain.
    #[inline]
    #[must_use]
    pub fn url_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.url_filter = filter.into();
        self
    }

    /// Sets the chart URL regex; the first capture group is the chart ID.
    #[inline]
    #[must_use]
    pub fn chart_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.chart_pattern = pattern.into();
        self
    }

    /// Sets the deadline for each protocol call.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the deadline for opening the transport.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the base directory for screencast output.
    #[inline]
    #[must_use]
    pub fn screencast_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.screencast_dir = dir.into();
        self
    }

    /// Uses the given protocol client instead of a [`CdpClient`].
    #[inline]
    #[must_use]
    pub fn client(mut self, client: Arc<dyn ProtocolClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the manager with validation. Does not connect.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the endpoint is not an http(s) URL, the chart
    /// pattern does not compile or lacks a capture group, or a timeout is
    /// zero.
    pub fn build(self) -> Result<ChartManager> {
        let endpoint = self.validate_endpoint()?;
        let pattern = ChartPattern::new(&self.config.chart_pattern)?;
        self.validate_timeouts()?;

        let client = match self.client {
            Some(client) => client,
            None => Arc::new(CdpClient::new(endpoint, self.config.connect_timeout())?),
        };

        Ok(ChartManager::new(
            ManagerSettings {
                url_filter: self.config.url_filter,
                pattern,
                call_timeout: Duration::from_millis(self.config.call_timeout_ms),
                screencast_dir: self.config.screencast_dir,
            },
            client,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ManagerBuilder {
    fn validate_endpoint(&self) -> Result<Url> {
        let endpoint = Url::parse(&self.config.endpoint).map_err(|e| {
            Error::config(format!(
                "Invalid debugging endpoint {:?}: {e}",
                self.config.endpoint
            ))
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Debugging endpoint must be http or https, got: {endpoint}\n\
                 Example: ChartManager::builder().endpoint(\"http://127.0.0.1:9222\")"
            )));
        }

        Ok(endpoint)
    }

    fn validate_timeouts(&self) -> Result<()> {
        if self.config.call_timeout_ms == 0 {
            return Err(Error::config("Call timeout must be greater than zero"));
        }
        if self.config.connect_timeout_ms == 0 {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
