//! Manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::chart::DEFAULT_CHART_PATTERN;

// ============================================================================
// Defaults
// ============================================================================

/// Default debugging endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9222";

/// Default URL filter substring.
pub const DEFAULT_URL_FILTER: &str = "chart";

/// Default per-call timeout in milliseconds.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Default transport connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default screencast base directory.
pub const DEFAULT_SCREENCAST_DIR: &str = "screencasts";

// ============================================================================
// ManagerConfig
// ============================================================================

/// Plain configuration for a [`ChartManager`](super::ChartManager).
///
/// Deserializable so a host application can load it from its own config
/// file. Validated by [`ManagerBuilder::build`](super::ManagerBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// HTTP discovery endpoint of the browser.
    pub endpoint: String,
    /// Substring a tab URL must contain.
    pub url_filter: String,
    /// Regex whose first capture group is the chart ID.
    pub chart_pattern: String,
    /// Deadline for each protocol call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Deadline for opening the transport, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Base directory for screencast output.
    pub screencast_dir: PathBuf,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            url_filter: DEFAULT_URL_FILTER.to_string(),
            chart_pattern: DEFAULT_CHART_PATTERN.to_string(),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            screencast_dir: PathBuf::from(DEFAULT_SCREENCAST_DIR),
        }
    }
}

impl ManagerConfig {
    /// Returns the per-call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Returns the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
