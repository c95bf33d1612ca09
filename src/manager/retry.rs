//! Retry classification for chart operations.
//!
//! A failed operation gets at most one retry. Whether it gets one, and what
//! recovery runs first, depends only on the error.

use std::error::Error as StdError;

use crate::error::{Error, ErrorCode};

/// Transport error text that means "the tab or session went away", not "the
/// operation was wrong". Matched case-insensitively against the cause chain.
/// Script exceptions are never matched: their text comes from the page.
const TRANSIENT_FAILURES: &[&str] = &[
    "connection closed",
    "broken pipe",
    "connection reset",
    "websocket protocol error",
    "trying to work with closed connection",
    "unexpected eof",
    "unexpected end of file",
    "session with given id not found",
    "target closed",
    "no target with given id",
    "cannot find context",
    "execution context was destroyed",
    "use of closed network connection",
];

/// What to do after a failed chart operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Surface the error unchanged.
    NoRetry,
    /// Re-establish the transport, then retry once.
    Reconnect,
    /// Refresh the tab catalogue, then retry once.
    ResyncTabs,
}

/// Returns `true` if the text matches a known transient-connectivity failure.
#[must_use]
pub fn is_transient_failure(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    TRANSIENT_FAILURES
        .iter()
        .any(|needle| text.contains(needle))
}

/// Classifies a boundary error.
///
/// - backend-unavailable: reconnect, then retry
/// - evaluation failure with a transient cause: resync tabs, then retry
/// - everything else (chart-not-found, validation, timeouts, page errors):
///   no retry
#[must_use]
pub fn retry_verdict(error: &Error) -> RetryVerdict {
    match error.code() {
        ErrorCode::BackendUnavailable => RetryVerdict::Reconnect,
        ErrorCode::EvaluationFailure if has_transient_cause(error) => RetryVerdict::ResyncTabs,
        _ => RetryVerdict::NoRetry,
    }
}

/// Walks the source chain, skipping script exceptions.
fn has_transient_cause(error: &Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        let from_page = matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ScriptException { .. })
        );
        if !from_page && is_transient_failure(&err.to_string()) {
            return true;
        }
        current = err.source();
    }
    false
}
