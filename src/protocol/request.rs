//! Request and Response message types.
//!
//! A request carries a numeric `id` allocated by the sending connection; the
//! browser echoes it on the matching response. Session-scoped traffic adds a
//! top-level `sessionId`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "sessionId": "8F2C...",
///   "method": "Runtime.evaluate",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation number.
    pub id: RequestId,

    /// Attached session the command is scoped to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a browser-level request.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, command: Command) -> Self {
        Self {
            id,
            session_id: None,
            command,
        }
    }

    /// Creates a request scoped to an attached session.
    #[inline]
    #[must_use]
    pub fn on_session(id: RequestId, session_id: SessionId, command: Command) -> Self {
        Self {
            id,
            session_id: Some(session_id),
            command,
        }
    }

    /// Returns the command's method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.command.method()
    }
}

// ============================================================================
// Response
// ============================================================================

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra detail.
    #[serde(default)]
    pub data: Option<String>,
}

/// A response from browser to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<RemoteError>,

    /// Session the reply belongs to, for session-scoped requests.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the response carried an error object.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => {
                let message = match err.data {
                    Some(data) if !data.is_empty() => format!("{} ({data})", err.message),
                    _ => err.message,
                };
                Err(Error::remote(err.code, message))
            }
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PageCommand, RuntimeCommand};

    #[test]
    fn test_request_serialization() {
        let command = Command::Page(PageCommand::Navigate {
            url: "https://example.com".to_string(),
        });
        let request = Request::new(RequestId::new(3), command);
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "Page.navigate");
        assert_eq!(json["params"]["url"], "https://example.com");
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn test_session_request_serialization() {
        let command = Command::Runtime(RuntimeCommand::Evaluate {
            expression: "document.title".into(),
            return_by_value: true,
            await_promise: false,
            user_gesture: false,
        });
        let request = Request::on_session(RequestId::new(9), SessionId::from("S1"), command);
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["sessionId"], "S1");
        assert_eq!(json["method"], "Runtime.evaluate");
        assert_eq!(request.method(), "Runtime.evaluate");
    }

    #[test]
    fn test_success_response() {
        let response: Response =
            serde_json::from_str(r#"{"id": 4, "result": {"sessionId": "S9"}}"#).expect("parse");
        assert!(!response.is_error());
        assert_eq!(response.id, RequestId::new(4));
        assert_eq!(response.get_string("sessionId"), "S9");
    }

    #[test]
    fn test_error_response_into_result() {
        let response: Response = serde_json::from_str(
            r#"{"id": 5, "error": {"code": -32000, "message": "No target with given id found"}}"#,
        )
        .expect("parse");
        assert!(response.is_error());

        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Remote { code: -32000, .. }));
        assert!(err.to_string().contains("No target with given id found"));
    }

    #[test]
    fn test_error_response_appends_data() {
        let response: Response = serde_json::from_str(
            r#"{"id": 6, "error": {"code": -32602, "message": "Invalid params", "data": "url: string expected"}}"#,
        )
        .expect("parse");
        let err = response.into_result().unwrap_err();
        assert!(err.to_string().contains("url: string expected"));
    }

    #[test]
    fn test_event_is_not_a_response() {
        let parsed = serde_json::from_str::<Response>(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}}"#,
        );
        assert!(parsed.is_err());
    }
}
