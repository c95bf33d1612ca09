//! Chart navigation with dialog handling.
//!
//! A reload or navigation can raise `beforeunload` or other JavaScript
//! dialogs that block the page until answered. While the navigation runs, a
//! handler accepts any dialog on the chart's session from a detached task
//! (handlers must not block the receive loop). The call returns after the
//! page's load event, and the chart's session is invalidated because the
//! old execution context is gone.
//!
//! One deadline covers the whole call: enabling page events, the navigation
//! request and the wait for the load event.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{ChartId, SessionId};
use crate::protocol::event::{JAVASCRIPT_DIALOG_OPENING, LOAD_EVENT_FIRED};
use crate::protocol::{Command, Event, PageCommand, ParsedEvent};
use crate::transport::ProtocolClient;

use super::core::ChartManager;

// ============================================================================
// ChartManager - Navigation
// ============================================================================

impl ChartManager {
    /// Reloads a chart tab and waits for it to load.
    ///
    /// # Errors
    ///
    /// - [`Error::EvaluationTimeout`] if the load event does not arrive
    ///   within the call timeout
    /// - Same resolve/retry errors as
    ///   [`eval_on_chart`](Self::eval_on_chart)
    pub async fn reload_chart(&self, chart_id: &ChartId) -> Result<()> {
        self.navigate_with(chart_id, PageCommand::Reload {
            ignore_cache: false,
        })
        .await
    }

    /// Navigates a chart tab to `url` and waits for it to load.
    ///
    /// The chart ID may change after a sync if the new URL maps to a
    /// different chart.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `url` is not absolute
    /// - [`Error::EvaluationFailed`] if the browser reports a navigation
    ///   error
    /// - Same errors as [`reload_chart`](Self::reload_chart)
    pub async fn navigate_chart(&self, chart_id: &ChartId, url: &str) -> Result<()> {
        let url = Url::parse(url)
            .map_err(|e| Error::validation(format!("Invalid navigation URL {url:?}: {e}")))?;

        self.navigate_with(chart_id, PageCommand::Navigate {
            url: url.to_string(),
        })
        .await
    }

    async fn navigate_with(&self, chart_id: &ChartId, command: PageCommand) -> Result<()> {
        let timeout = self.call_timeout();

        self.run_on_chart(chart_id, "navigate", |client, session_id| {
            let command = command.clone();
            let chart_id = chart_id.clone();
            async move { navigate_and_wait(client, session_id, chart_id, command, timeout).await }
        })
        .await?;

        self.invalidate_chart_session(chart_id).await;
        info!(chart_id = %chart_id, "Chart navigated");
        Ok(())
    }
}

// ============================================================================
// Navigation Steps
// ============================================================================

async fn navigate_and_wait(
    client: Arc<dyn ProtocolClient>,
    session_id: SessionId,
    chart_id: ChartId,
    command: PageCommand,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let timed_out = || Error::evaluation_timeout(chart_id.clone(), timeout.as_millis() as u64);
    let remaining = || {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() { Err(timed_out()) } else { Ok(left) }
    };
    // A request cut short by the shared deadline reports the full budget.
    let budget = |e: Error| match e {
        Error::RequestTimeout { .. } => timed_out(),
        e => e,
    };

    client
        .send_on_session(&session_id, Command::Page(PageCommand::Enable), remaining()?)
        .await
        .map_err(budget)?;

    let loaded = CancellationToken::new();
    let load_handler = {
        let loaded = loaded.clone();
        let session_id = session_id.clone();
        client.register_event_handler(
            LOAD_EVENT_FIRED,
            Arc::new(move |event: &Event| {
                if event.is_for_session(&session_id) {
                    loaded.cancel();
                }
            }),
        )
    };
    let dialog_handler = client.register_event_handler(
        JAVASCRIPT_DIALOG_OPENING,
        dialog_acceptor(Arc::clone(&client), session_id.clone(), timeout),
    );

    let result = async {
        let reply = client
            .send_on_session(&session_id, Command::Page(command), remaining()?)
            .await
            .map_err(budget)?;
        if let Some(error_text) = reply.get("errorText").and_then(Value::as_str)
            && !error_text.is_empty()
        {
            return Err(Error::evaluation(format!("Navigation failed: {error_text}")));
        }

        timeout_at(deadline, loaded.cancelled())
            .await
            .map_err(|_| timed_out())
    }
    .await;

    client.unregister_event_handler(load_handler);
    client.unregister_event_handler(dialog_handler);
    result
}

/// Builds a handler that accepts every dialog opened on `session_id`.
fn dialog_acceptor(
    client: Arc<dyn ProtocolClient>,
    session_id: SessionId,
    timeout: Duration,
) -> crate::transport::EventHandler {
    Arc::new(move |event: &Event| {
        if !event.is_for_session(&session_id) {
            return;
        }
        if let ParsedEvent::JavascriptDialogOpening {
            message,
            dialog_type,
            ..
        } = event.parse()
        {
            debug!(dialog_type = %dialog_type, message = %message, "Accepting dialog");
        }

        let client = Arc::clone(&client);
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let command = Command::Page(PageCommand::HandleJavaScriptDialog {
                accept: true,
                prompt_text: None,
            });
            if let Err(e) = client.send_on_session(&session_id, command, timeout).await {
                warn!(error = %e, "Dialog accept failed");
            }
        });
    })
}
