//! Chart descriptors returned to callers.

use serde::{Deserialize, Serialize};

use crate::identifiers::{ChartId, ScreencastId, TargetId};

// ============================================================================
// ChartInfo
// ============================================================================

/// One chart tab, rebuilt on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartInfo {
    /// Stable handle derived from the URL.
    pub chart_id: ChartId,
    /// Browser target currently showing the chart.
    pub target_id: TargetId,
    /// Tab URL at sync time.
    pub url: String,
    /// Tab title at sync time.
    pub title: String,
}

// ============================================================================
// ActiveChartInfo
// ============================================================================

/// The chart the browser lists first, with its live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChartInfo {
    /// Chart descriptor.
    #[serde(flatten)]
    pub chart: ChartInfo,
    /// Whether a session token is cached for the chart's tab.
    pub attached: bool,
    /// Active screencast on the chart, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub screencast: Option<ScreencastId>,
}
