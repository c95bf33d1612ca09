//! Error types for chart automation.
//!
//! Every surfaced error maps onto one stable [`ErrorCode`] so a façade layer
//! can translate failures into its own signaling without re-deriving their
//! meaning.
//!
//! # Error Categories
//!
//! | Category | Variants | Code |
//! |----------|----------|------|
//! | Input | [`Error::Validation`], [`Error::Config`] | `validation` |
//! | Lookup | [`Error::ChartNotFound`] | `chart_not_found` |
//! | Backend | [`Error::BackendUnavailable`], [`Error::NotConnected`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Http`], [`Error::WebSocket`] | `backend_unavailable` |
//! | Evaluation | [`Error::EvaluationFailed`], [`Error::Remote`], [`Error::ScriptException`], [`Error::Protocol`], [`Error::Cancelled`] | `evaluation_failure` |
//! | Deadline | [`Error::EvaluationTimeout`], [`Error::RequestTimeout`] | `evaluation_timeout` |
//! | Page | [`Error::PageApiUnavailable`] | `page_api_unavailable` |
//!
//! Transport-level variants are produced by the protocol client. The manager
//! wraps them into the boundary variants before returning.

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde::Serialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{ChartId, RequestId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorCode
// ============================================================================

/// Closed set of externally visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Caller input or configuration rejected.
    Validation,
    /// No open tab matches the chart ID.
    ChartNotFound,
    /// The debugging connection itself is unreachable or broken.
    BackendUnavailable,
    /// One operation failed on an otherwise healthy connection.
    EvaluationFailure,
    /// The operation exceeded its deadline.
    EvaluationTimeout,
    /// The page loaded but its scripting API is not ready.
    PageApiUnavailable,
}

impl ErrorCode {
    /// Returns the stable string form of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::ChartNotFound => "chart_not_found",
            Self::BackendUnavailable => "backend_unavailable",
            Self::EvaluationFailure => "evaluation_failure",
            Self::EvaluationTimeout => "evaluation_timeout",
            Self::PageApiUnavailable => "page_api_unavailable",
        }
    }

    /// Parses a code as reported by a page script envelope.
    ///
    /// Matching is case-insensitive and accepts `-` in place of `_`.
    #[must_use]
    pub fn from_envelope(code: &str) -> Option<Self> {
        let normalized = code.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "validation" => Some(Self::Validation),
            "chart_not_found" => Some(Self::ChartNotFound),
            "backend_unavailable" => Some(Self::BackendUnavailable),
            "evaluation_failure" => Some(Self::EvaluationFailure),
            "evaluation_timeout" => Some(Self::EvaluationTimeout),
            "page_api_unavailable" => Some(Self::PageApiUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Boundary Errors
    // ========================================================================
    /// Caller input rejected.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// Invalid manager or client configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No tab currently maps to the chart ID.
    #[error("Chart not found: {chart_id}")]
    ChartNotFound {
        /// The missing chart.
        chart_id: ChartId,
    },

    /// The debugging backend is unreachable.
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Context of the failure.
        message: String,
        /// Underlying transport error, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// An evaluation or chart operation failed.
    #[error("Evaluation failed: {message}")]
    EvaluationFailed {
        /// Context of the failure.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// A chart operation exceeded its deadline.
    #[error("Evaluation timed out after {timeout_ms}ms on chart {chart_id}")]
    EvaluationTimeout {
        /// Chart the operation targeted.
        chart_id: ChartId,
        /// Milliseconds waited.
        timeout_ms: u64,
    },

    /// The page's scripting API is not available.
    #[error("Page API unavailable: {message}")]
    PageApiUnavailable {
        /// Message reported by the page.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// No live connection; `connect()` has not succeeded yet.
    #[error("Not connected")]
    NotConnected,

    /// Connection could not be established or a write failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while the request was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No reply within the request deadline.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request that timed out.
        request_id: RequestId,
        /// Milliseconds waited.
        timeout_ms: u64,
    },

    /// The caller cancelled the request explicitly.
    #[error("Request {request_id} cancelled")]
    Cancelled {
        /// The cancelled request.
        request_id: RequestId,
    },

    /// The browser answered with an error object.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    /// The evaluated script threw.
    #[error("Script exception: {message}")]
    ScriptException {
        /// Exception description.
        message: String,
    },

    /// Malformed or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP discovery error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a validation error.
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a chart not found error.
    #[inline]
    pub fn chart_not_found(chart_id: ChartId) -> Self {
        Self::ChartNotFound { chart_id }
    }

    /// Creates a backend unavailable error wrapping a cause.
    #[inline]
    pub fn backend_unavailable(message: impl Into<String>, source: Error) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an evaluation failure without a cause.
    #[inline]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::EvaluationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an evaluation failure wrapping a cause.
    #[inline]
    pub fn evaluation_caused_by(message: impl Into<String>, source: Error) -> Self {
        Self::EvaluationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an evaluation timeout error.
    #[inline]
    pub fn evaluation_timeout(chart_id: ChartId, timeout_ms: u64) -> Self {
        Self::EvaluationTimeout {
            chart_id,
            timeout_ms,
        }
    }

    /// Creates a page API unavailable error.
    #[inline]
    pub fn page_api_unavailable(message: impl Into<String>) -> Self {
        Self::PageApiUnavailable {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a remote protocol error.
    #[inline]
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Creates a script exception error.
    #[inline]
    pub fn script_exception(message: impl Into<String>) -> Self {
        Self::ScriptException {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Classification
// ============================================================================

impl Error {
    /// Returns the stable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::Config { .. } => ErrorCode::Validation,
            Self::ChartNotFound { .. } => ErrorCode::ChartNotFound,
            Self::BackendUnavailable { .. }
            | Self::NotConnected
            | Self::Connection { .. }
            | Self::ConnectionClosed
            | Self::WebSocket(_)
            | Self::Http(_) => ErrorCode::BackendUnavailable,
            Self::EvaluationTimeout { .. } | Self::RequestTimeout { .. } => {
                ErrorCode::EvaluationTimeout
            }
            Self::PageApiUnavailable { .. } => ErrorCode::PageApiUnavailable,
            Self::EvaluationFailed { .. }
            | Self::Cancelled { .. }
            | Self::Remote { .. }
            | Self::ScriptException { .. }
            | Self::Protocol { .. }
            | Self::Io(_)
            | Self::Json(_) => ErrorCode::EvaluationFailure,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::EvaluationTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the connection itself is unusable.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::Http(_)
        )
    }

    /// Returns the messages of this error and every underlying source.
    #[must_use]
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut current = self.source();
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}

// ============================================================================
// Tests
// ============================================================================
