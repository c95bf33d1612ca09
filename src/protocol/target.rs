//! HTTP discovery records.
//!
//! Returned by the browser's `/json/version` and `/json/list` endpoints.

use serde::Deserialize;

use crate::identifiers::TargetId;

/// Target kind reported for ordinary tabs.
pub const PAGE_TARGET_TYPE: &str = "page";

/// One entry of `/json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetInfo {
    /// Browser-assigned target ID.
    pub id: TargetId,
    /// `page`, `iframe`, `service_worker`, ...
    #[serde(rename = "type")]
    pub target_type: String,
    /// Document title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Per-target transport URL (unused; sessions go through the browser connection).
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    /// Returns `true` for ordinary tab targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == PAGE_TARGET_TYPE
    }
}

/// Body of `/json/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    /// Browser product string.
    #[serde(rename = "Browser", default)]
    pub browser: String,
    /// Protocol version.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    /// Browser-level transport URL.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}
