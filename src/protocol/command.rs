//! Command definitions organized by domain.
//!
//! Commands follow the `Domain.method` naming of the debugging protocol.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Attach, detach |
//! | `Runtime` | Script evaluation |
//! | `Input` | Mouse, keyboard, text insertion |
//! | `Page` | Enable, navigate, reload, dialogs, screencast |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Input domain commands.
    Input(InputCommand),
    /// Page domain commands.
    Page(PageCommand),
}

impl Command {
    /// Returns the `Domain.method` name of the command.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Target(TargetCommand::AttachToTarget { .. }) => "Target.attachToTarget",
            Self::Target(TargetCommand::DetachFromTarget { .. }) => "Target.detachFromTarget",
            Self::Runtime(RuntimeCommand::Evaluate { .. }) => "Runtime.evaluate",
            Self::Input(InputCommand::DispatchMouseEvent { .. }) => "Input.dispatchMouseEvent",
            Self::Input(InputCommand::DispatchKeyEvent(_)) => "Input.dispatchKeyEvent",
            Self::Input(InputCommand::InsertText { .. }) => "Input.insertText",
            Self::Page(PageCommand::Enable) => "Page.enable",
            Self::Page(PageCommand::Navigate { .. }) => "Page.navigate",
            Self::Page(PageCommand::Reload { .. }) => "Page.reload",
            Self::Page(PageCommand::HandleJavaScriptDialog { .. }) => {
                "Page.handleJavaScriptDialog"
            }
            Self::Page(PageCommand::StartScreencast { .. }) => "Page.startScreencast",
            Self::Page(PageCommand::StopScreencast) => "Page.stopScreencast",
            Self::Page(PageCommand::ScreencastFrameAck { .. }) => "Page.screencastFrameAck",
        }
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Attach to a target, returning a session token.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Route session traffic over the browser connection.
        flatten: bool,
    },

    /// Detach an attached session.
    #[serde(rename = "Target.detachFromTarget")]
    DetachFromTarget {
        /// Session to detach.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for script evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript expression.
        expression: String,
        /// Serialize the result by value.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Await a returned promise.
        #[serde(rename = "awaitPromise")]
        await_promise: bool,
        /// Treat the evaluation as user-initiated.
        #[serde(rename = "userGesture")]
        user_gesture: bool,
    },
}

// ============================================================================
// Input Commands
// ============================================================================

/// Mouse event kind for `Input.dispatchMouseEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventType {
    /// Button press.
    #[serde(rename = "mousePressed")]
    Pressed,
    /// Button release.
    #[serde(rename = "mouseReleased")]
    Released,
    /// Pointer move.
    #[serde(rename = "mouseMoved")]
    Moved,
}

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// No button (moves).
    None,
    /// Primary button.
    #[default]
    Left,
    /// Wheel button.
    Middle,
    /// Secondary button.
    Right,
}

/// Key event kind for `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEventType {
    /// Key press that produces text.
    #[serde(rename = "keyDown")]
    KeyDown,
    /// Key press without text.
    #[serde(rename = "rawKeyDown")]
    RawKeyDown,
    /// Key release.
    #[serde(rename = "keyUp")]
    KeyUp,
    /// Character input.
    #[serde(rename = "char")]
    Char,
}

/// Parameters of `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchKeyEventParams {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    /// DOM `key` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// DOM `code` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Text generated by the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Legacy key code.
    #[serde(
        rename = "windowsVirtualKeyCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub windows_virtual_key_code: Option<u32>,
    /// Modifier bit field (Alt=1, Ctrl=2, Meta=4, Shift=8).
    #[serde(default)]
    pub modifiers: u8,
}

/// Input domain commands for trusted input dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum InputCommand {
    /// Dispatch one mouse event.
    #[serde(rename = "Input.dispatchMouseEvent")]
    DispatchMouseEvent {
        /// Event kind.
        #[serde(rename = "type")]
        event_type: MouseEventType,
        /// X in CSS pixels.
        x: f64,
        /// Y in CSS pixels.
        y: f64,
        /// Mouse button.
        button: MouseButton,
        /// Number of consecutive clicks.
        #[serde(rename = "clickCount")]
        click_count: u32,
    },

    /// Dispatch one key event.
    #[serde(rename = "Input.dispatchKeyEvent")]
    DispatchKeyEvent(DispatchKeyEventParams),

    /// Insert text as if typed by an IME.
    #[serde(rename = "Input.insertText")]
    InsertText {
        /// Text to insert.
        text: String,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands for navigation, dialogs and screencast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page domain events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Navigate to URL.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Destination URL.
        url: String,
    },

    /// Reload current page.
    #[serde(rename = "Page.reload")]
    Reload {
        /// Bypass the cache.
        #[serde(rename = "ignoreCache")]
        ignore_cache: bool,
    },

    /// Accept or dismiss an open JavaScript dialog.
    #[serde(rename = "Page.handleJavaScriptDialog")]
    HandleJavaScriptDialog {
        /// Accept (`true`) or dismiss.
        accept: bool,
        /// Text for prompt dialogs.
        #[serde(rename = "promptText", skip_serializing_if = "Option::is_none")]
        prompt_text: Option<String>,
    },

    /// Start pushing screencast frames.
    #[serde(rename = "Page.startScreencast")]
    StartScreencast {
        /// `png` or `jpeg`.
        format: String,
        /// JPEG quality (0-100).
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
        /// Maximum frame width.
        #[serde(rename = "maxWidth", skip_serializing_if = "Option::is_none")]
        max_width: Option<u32>,
        /// Maximum frame height.
        #[serde(rename = "maxHeight", skip_serializing_if = "Option::is_none")]
        max_height: Option<u32>,
        /// Send every n-th frame.
        #[serde(rename = "everyNthFrame", skip_serializing_if = "Option::is_none")]
        every_nth_frame: Option<u32>,
    },

    /// Stop pushing screencast frames.
    #[serde(rename = "Page.stopScreencast")]
    StopScreencast,

    /// Acknowledge a screencast frame.
    #[serde(rename = "Page.screencastFrameAck")]
    ScreencastFrameAck {
        /// Frame sequence number from the frame event.
        #[serde(rename = "sessionId")]
        frame_session: i64,
    },
}

// ============================================================================
// Tests
// ============================================================================
