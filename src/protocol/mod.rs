//! Remote-debugging wire message types.
//!
//! Only the command subset this crate needs is modelled: target
//! attach/detach, script evaluation, trusted input, page-domain enable,
//! navigation, dialog handling and screencast start/stop/ack.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Discriminator |
//! |--------------|-----------|---------------|
//! | `Request` | Local → Browser | numeric `id` + `method` |
//! | `Response` | Browser → Local | numeric `id`, `result` or `error` |
//! | `Event` | Browser → Local | `method`, no `id` |
//!
//! Any message may carry a top-level `sessionId`, scoping it to an attached
//! target session.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event type and typed parsing |
//! | `keyboard` | Key table for trusted key dispatch |
//! | `request` | Request and Response types |
//! | `target` | HTTP discovery records |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Keyboard key table.
pub mod keyboard;

/// Request and Response message types.
pub mod request;

/// HTTP discovery records.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, DispatchKeyEventParams, InputCommand, KeyEventType, MouseButton, MouseEventType,
    PageCommand, RuntimeCommand, TargetCommand,
};
pub use event::{Event, ParsedEvent, ScreencastFrame};
pub use keyboard::{Key, Modifiers};
pub use request::{RemoteError, Request, Response};
pub use target::{TargetInfo, VersionInfo};
