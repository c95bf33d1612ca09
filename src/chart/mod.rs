//! Chart catalogue types.
//!
//! A chart is an open tab whose URL matches the configured filter and chart
//! pattern. Its [`ChartId`](crate::identifiers::ChartId) is derived from the
//! URL and stays stable across tab syncs, unlike the browser's target ID.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `info` | `ChartInfo`, `ActiveChartInfo` |
//! | `pattern` | Chart ID derivation and target selection |
//! | `envelope` | Script result envelope decoding |
//! | `zorder` | Drawing z-order actions |

// ============================================================================
// Submodules
// ============================================================================

mod envelope;
mod info;
mod pattern;
mod zorder;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{ScriptEnvelope, decode_envelope};
pub use info::{ActiveChartInfo, ChartInfo};
pub use pattern::{ChartPattern, DEFAULT_CHART_PATTERN, select_charts};
pub use zorder::ZOrderAction;
