//! Chart session and target manager.
//!
//! [`ChartManager`] is the control surface: it discovers chart tabs, keeps a
//! lazily attached session per tab, serializes operations per chart, and
//! retries once after recovering from transient failures.
//!
//! # Chart States
//!
//! ```text
//! Unknown ──(first operation attaches)──► Attached
//!    ▲                                        │
//!    └──(failure, navigation, invalidation, ──┘
//!        reconnect or removal by sync)
//! ```
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | `ManagerBuilder` |
//! | `config` | `ManagerConfig` and defaults |
//! | `core` | State, sync, sessions, retrying operation path |
//! | `eval` | Script evaluation |
//! | `input` | Trusted click, key and text input |
//! | `navigation` | Reload and navigate with dialog handling |
//! | `retry` | Retry classification |
//! | `screencast` | Screencast registry |

// ============================================================================
// Submodules
// ============================================================================

mod builder;
mod config;
mod core;
mod eval;
mod input;
mod navigation;
mod retry;
mod screencast;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use config::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENDPOINT, DEFAULT_SCREENCAST_DIR,
    DEFAULT_URL_FILTER, ManagerConfig,
};
pub use core::ChartManager;
pub use retry::{RetryVerdict, is_transient_failure, retry_verdict};
