//! Chart ID derivation and target selection.

// ============================================================================
// Imports
// ============================================================================

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::identifiers::ChartId;
use crate::protocol::TargetInfo;

use super::ChartInfo;

// ============================================================================
// Constants
// ============================================================================

/// Default chart URL pattern; the first capture group is the chart ID.
pub const DEFAULT_CHART_PATTERN: &str = r"/chart/([^/?#]+)";

// ============================================================================
// ChartPattern
// ============================================================================

/// Compiled chart URL pattern.
#[derive(Debug, Clone)]
pub struct ChartPattern {
    regex: Regex,
}

impl ChartPattern {
    /// Compiles a pattern with at least one capture group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pattern does not compile or has no
    /// capture group.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::config(format!("Invalid chart pattern {pattern:?}: {e}")))?;

        if regex.captures_len() < 2 {
            return Err(Error::config(format!(
                "Chart pattern {pattern:?} needs a capture group for the chart ID"
            )));
        }

        Ok(Self { regex })
    }

    /// Returns the pattern source.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Derives the chart ID from a tab URL.
    #[must_use]
    pub fn chart_id(&self, url: &str) -> Option<ChartId> {
        self.regex
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|id| !id.is_empty())
            .map(ChartId::from)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Selects chart tabs from a target listing.
///
/// Keeps page targets whose URL contains `url_filter` (empty matches all)
/// and yields a chart ID. On a chart ID collision the later target wins but
/// keeps the earlier one's position, so the result stays in discovery order
/// with unique chart IDs.
#[must_use]
pub fn select_charts(
    targets: &[TargetInfo],
    url_filter: &str,
    pattern: &ChartPattern,
) -> Vec<ChartInfo> {
    let mut charts: Vec<ChartInfo> = Vec::new();
    let mut positions: FxHashMap<ChartId, usize> = FxHashMap::default();

    for target in targets {
        if !target.is_page() || !target.url.contains(url_filter) {
            continue;
        }
        let Some(chart_id) = pattern.chart_id(&target.url) else {
            continue;
        };

        let info = ChartInfo {
            chart_id: chart_id.clone(),
            target_id: target.id.clone(),
            url: target.url.clone(),
            title: target.title.clone(),
        };

        match positions.get(&chart_id) {
            Some(&index) => charts[index] = info,
            None => {
                positions.insert(chart_id, charts.len());
                charts.push(info);
            }
        }
    }

    charts
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::TargetId;

    fn target(id: &str, kind: &str, url: &str) -> TargetInfo {
        TargetInfo {
            id: TargetId::from(id),
            target_type: kind.into(),
            title: format!("title {id}"),
            url: url.into(),
            web_socket_debugger_url: None,
        }
    }

    fn pattern() -> ChartPattern {
        ChartPattern::new(DEFAULT_CHART_PATTERN).unwrap()
    }

    #[test]
    fn test_chart_id_derivation() {
        let pattern = pattern();
        assert_eq!(
            pattern.chart_id("https://x.com/chart/abc123/"),
            Some(ChartId::from("abc123"))
        );
        assert_eq!(
            pattern.chart_id("https://x.com/chart/abc?symbol=BTC"),
            Some(ChartId::from("abc"))
        );
        assert_eq!(pattern.chart_id("https://x.com/chart/"), None);
        assert_eq!(pattern.chart_id("https://x.com/ideas/"), None);
    }

    #[test]
    fn test_pattern_requires_capture_group() {
        assert!(matches!(
            ChartPattern::new("/chart/"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(ChartPattern::new("(["), Err(Error::Config { .. })));
    }

    #[test]
    fn test_select_filters_type_and_url() {
        let targets = vec![
            target("A", "page", "https://x.com/chart/one/"),
            target("B", "service_worker", "https://x.com/chart/two/"),
            target("C", "page", "https://x.com/ideas/three/"),
            target("D", "page", "https://other.com/chart/four/"),
        ];
        let charts = select_charts(&targets, "x.com", &pattern());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].chart_id.as_str(), "one");
        assert_eq!(charts[0].target_id.as_str(), "A");
    }

    #[test]
    fn test_collision_last_seen_wins() {
        let targets = vec![
            target("A", "page", "https://x.com/chart/same/"),
            target("B", "page", "https://x.com/chart/other/"),
            target("C", "page", "https://x.com/chart/same/?v=2"),
        ];
        let charts = select_charts(&targets, "chart", &pattern());
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].chart_id.as_str(), "same");
        assert_eq!(charts[0].target_id.as_str(), "C");
        assert_eq!(charts[1].chart_id.as_str(), "other");
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let targets = vec![target("A", "page", "https://x.com/chart/one/")];
        assert_eq!(select_charts(&targets, "", &pattern()).len(), 1);
    }
}
