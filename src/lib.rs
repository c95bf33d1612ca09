//! Chart CDP - chart tab automation over the browser remote-debugging protocol.
//!
//! This library drives a charting web application running in browser tabs by
//! speaking the debugging protocol directly to the browser process.
//!
//! # Architecture
//!
//! - **Protocol client**: one WebSocket to the browser, correlated
//!   command/response exchange, uncorrelated event dispatch
//! - **Chart manager**: discovers chart tabs, attaches sessions lazily,
//!   serializes operations per chart, retries once after transient failures
//! - **Screencast pipeline**: streams frames to disk under ack-based
//!   backpressure without stalling the receive loop
//!
//! Key design principles:
//!
//! - The receive loop is the only socket reader and never blocks
//! - Session-scoped traffic uses flatten mode (top-level `sessionId`)
//! - No globals: every [`ChartManager`] is independent
//!
//! # Quick Start
//!
//! ```no_run
//! use chart_cdp::{ChartId, ChartManager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ChartManager::builder()
//!         .endpoint("http://127.0.0.1:9222")
//!         .url_filter("chart")
//!         .build()?;
//!     manager.connect().await?;
//!
//!     for chart in manager.list_charts().await? {
//!         println!("{}: {}", chart.chart_id, chart.title);
//!     }
//!
//!     let data = manager
//!         .eval_on_chart(&ChartId::from("abc123"), "({ok: true, data: {v: 1}})")
//!         .await?;
//!     println!("{data}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`chart`] | Chart descriptors, chart ID derivation, script envelopes |
//! | [`error`] | Error types, stable [`ErrorCode`]s and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ChartManager`] and its configuration |
//! | [`protocol`] | Wire message types |
//! | [`screencast`] | Screencast frame pipeline |
//! | [`transport`] | WebSocket transport, discovery, [`ProtocolClient`] |

// ============================================================================
// Modules
// ============================================================================

/// Chart descriptors and script envelope decoding.
pub mod chart;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol and chart entities.
pub mod identifiers;

/// Chart manager: catalogue, sessions, retries.
///
/// Use [`ChartManager::builder()`] to create a configured instance.
pub mod manager;

/// Wire protocol message types.
pub mod protocol;

/// Screencast frame pipeline.
pub mod screencast;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Chart types
pub use chart::{ActiveChartInfo, ChartInfo, ChartPattern, ScriptEnvelope, ZOrderAction};

// Error types
pub use error::{Error, ErrorCode, Result};

// Identifier types
pub use identifiers::{ChartId, HandlerId, RequestId, ScreencastId, SessionId, TargetId};

// Manager types
pub use manager::{ChartManager, ManagerBuilder, ManagerConfig, RetryVerdict};

// Protocol types
pub use protocol::{Key, Modifiers, MouseButton};

// Screencast types
pub use screencast::{ImageFormat, ScreencastInfo, ScreencastOptions, ScreencastStatus};

// Transport types
pub use transport::{CdpClient, EventHandler, ProtocolClient};
