//! Event message types.
//!
//! Events are uncorrelated notifications pushed by the browser. They carry a
//! `method` but no `id`; session-scoped events add a top-level `sessionId`.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `screencastFrame`, `javascriptDialogOpening`, `loadEventFired` |
//! | `Target` | `detachedFromTarget` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Event Names
// ============================================================================

/// Screencast frame pushed after `Page.startScreencast`.
pub const SCREENCAST_FRAME: &str = "Page.screencastFrame";

/// A JavaScript dialog is about to open.
pub const JAVASCRIPT_DIALOG_OPENING: &str = "Page.javascriptDialogOpening";

/// The page's `load` event fired.
pub const LOAD_EVENT_FIRED: &str = "Page.loadEventFired";

/// An attached session was detached by the browser.
pub const DETACHED_FROM_TARGET: &str = "Target.detachedFromTarget";

// ============================================================================
// Event
// ============================================================================

/// An event notification from browser to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Page.screencastFrame",
///   "sessionId": "8F2C...",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.event` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session the event belongs to, if session-scoped.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns `true` if the event belongs to the given session.
    #[inline]
    #[must_use]
    pub fn is_for_session(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            SCREENCAST_FRAME => match serde_json::from_value::<ScreencastFrame>(self.params.clone())
            {
                Ok(frame) => ParsedEvent::ScreencastFrame(frame),
                Err(_) => ParsedEvent::Unknown {
                    method: self.method.clone(),
                },
            },

            JAVASCRIPT_DIALOG_OPENING => ParsedEvent::JavascriptDialogOpening {
                message: self.param_str("message"),
                dialog_type: self.param_str("type"),
                url: self.param_str("url"),
            },

            LOAD_EVENT_FIRED => ParsedEvent::LoadEventFired {
                timestamp: self
                    .params
                    .get("timestamp")
                    .and_then(Value::as_f64)
                    .unwrap_or_default(),
            },

            DETACHED_FROM_TARGET => ParsedEvent::DetachedFromTarget {
                session_id: SessionId::new(self.param_str("sessionId")),
                target_id: self
                    .params
                    .get("targetId")
                    .and_then(Value::as_str)
                    .map(TargetId::from),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
            },
        }
    }

    fn param_str(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

// ============================================================================
// ScreencastFrame
// ============================================================================

/// Geometry reported with a screencast frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastFrameMetadata {
    /// Device width in CSS pixels.
    #[serde(default)]
    pub device_width: f64,
    /// Device height in CSS pixels.
    #[serde(default)]
    pub device_height: f64,
    /// Capture timestamp in seconds since epoch.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Payload of a `Page.screencastFrame` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScreencastFrame {
    /// Base64-encoded image.
    pub data: String,
    /// Frame geometry.
    #[serde(default)]
    pub metadata: ScreencastFrameMetadata,
    /// Frame sequence number to acknowledge.
    #[serde(rename = "sessionId")]
    pub frame_session: i64,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// One captured frame awaiting acknowledgment.
    ScreencastFrame(ScreencastFrame),

    /// A dialog is blocking the page.
    JavascriptDialogOpening {
        /// Dialog text.
        message: String,
        /// `alert`, `confirm`, `prompt` or `beforeunload`.
        dialog_type: String,
        /// URL of the frame that opened it.
        url: String,
    },

    /// Page load completed.
    LoadEventFired {
        /// Monotonic timestamp in seconds.
        timestamp: f64,
    },

    /// The browser detached a session.
    DetachedFromTarget {
        /// Session that was detached.
        session_id: SessionId,
        /// Target it belonged to.
        target_id: Option<TargetId>,
    },

    /// Any other event.
    Unknown {
        /// Event method.
        method: String,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screencast_frame_parse() {
        let event: Event = serde_json::from_str(
            r#"{
                "method": "Page.screencastFrame",
                "sessionId": "S1",
                "params": {"data": "aGVsbG8=", "sessionId": 3, "metadata": {"deviceWidth": 800, "deviceHeight": 600}}
            }"#,
        )
        .expect("parse");

        assert_eq!(event.domain(), "Page");
        assert!(event.is_for_session(&SessionId::from("S1")));
        match event.parse() {
            ParsedEvent::ScreencastFrame(frame) => {
                assert_eq!(frame.frame_session, 3);
                assert_eq!(frame.data, "aGVsbG8=");
                assert_eq!(frame.metadata.device_width, 800.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frame_is_unknown() {
        let event: Event = serde_json::from_str(
            r#"{"method": "Page.screencastFrame", "params": {"data": "x"}}"#,
        )
        .expect("parse");
        assert!(matches!(event.parse(), ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_dialog_parse() {
        let event: Event = serde_json::from_str(
            r#"{"method": "Page.javascriptDialogOpening", "params": {"message": "Leave?", "type": "beforeunload", "url": "https://x"}}"#,
        )
        .expect("parse");
        match event.parse() {
            ParsedEvent::JavascriptDialogOpening { dialog_type, message, .. } => {
                assert_eq!(dialog_type, "beforeunload");
                assert_eq!(message, "Leave?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_event_without_params() {
        let event: Event =
            serde_json::from_str(r#"{"method": "Page.frameResized"}"#).expect("parse");
        assert!(event.params.is_null());
        assert!(event.session_id.is_none());
        assert!(matches!(event.parse(), ParsedEvent::Unknown { .. }));
    }
}
