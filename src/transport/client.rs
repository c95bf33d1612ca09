//! Protocol client seam and its WebSocket implementation.
//!
//! [`ProtocolClient`] is the surface the chart manager talks to. The required
//! methods cover connection lifecycle, raw command exchange and event
//! registration; session and input helpers are provided on top of them so a
//! test double only has to script the raw exchange.
//!
//! [`CdpClient`] implements the trait over one browser-level connection in
//! flatten mode: session-scoped commands carry a top-level `sessionId` on the
//! same socket instead of opening one socket per target.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{HandlerId, SessionId, TargetId};
use crate::protocol::{
    Command, DispatchKeyEventParams, InputCommand, Key, Modifiers, MouseButton, MouseEventType,
    RuntimeCommand, TargetCommand, TargetInfo, VersionInfo,
};

use super::connection::Connection;
use super::discovery::Discovery;
use super::events::{EventHandler, EventRegistry};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for opening the transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ProtocolClient
// ============================================================================

/// Correlated command exchange plus uncorrelated event delivery.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Opens the transport and starts the receive loop.
    ///
    /// Returns immediately if already connected.
    ///
    /// # Errors
    ///
    /// Returns a connection-class error if discovery or the handshake fails.
    async fn connect(&self) -> Result<()>;

    /// Tears down the transport. Pending requests fail with
    /// [`Error::ConnectionClosed`].
    async fn close(&self);

    /// Returns `true` while the transport is live.
    fn is_connected(&self) -> bool;

    /// Lists open targets over HTTP discovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the discovery call fails.
    async fn list_targets(&self) -> Result<Vec<TargetInfo>>;

    /// Sends a browser-level command and waits for its reply.
    ///
    /// # Errors
    ///
    /// Transport errors, [`Error::RequestTimeout`] or [`Error::Remote`].
    async fn send(&self, command: Command, request_timeout: Duration) -> Result<Value>;

    /// Sends a command scoped to an attached session.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    async fn send_on_session(
        &self,
        session_id: &SessionId,
        command: Command,
        request_timeout: Duration,
    ) -> Result<Value>;

    /// Registers a handler for an event method.
    fn register_event_handler(&self, method: &str, handler: EventHandler) -> HandlerId;

    /// Removes a handler. Returns `false` if it was already gone.
    fn unregister_event_handler(&self, id: HandlerId) -> bool;

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Attaches to a target in flatten mode and returns the session token.
    ///
    /// # Errors
    ///
    /// - Any [`send`](Self::send) error
    /// - [`Error::Protocol`] if the reply carries no `sessionId`
    async fn attach_to_target(
        &self,
        target_id: &TargetId,
        request_timeout: Duration,
    ) -> Result<SessionId> {
        let command = Command::Target(TargetCommand::AttachToTarget {
            target_id: target_id.clone(),
            flatten: true,
        });
        let result = self.send(command, request_timeout).await?;

        match result.get("sessionId").and_then(Value::as_str) {
            Some(session) if !session.is_empty() => Ok(SessionId::from(session)),
            _ => Err(Error::protocol(format!(
                "Attach to {target_id} returned no sessionId"
            ))),
        }
    }

    /// Detaches an attached session.
    ///
    /// # Errors
    ///
    /// Any [`send`](Self::send) error.
    async fn detach_from_target(
        &self,
        session_id: &SessionId,
        request_timeout: Duration,
    ) -> Result<()> {
        let command = Command::Target(TargetCommand::DetachFromTarget {
            session_id: session_id.clone(),
        });
        self.send(command, request_timeout).await?;
        Ok(())
    }

    // ========================================================================
    // Script Evaluation
    // ========================================================================

    /// Evaluates an expression and returns its value.
    ///
    /// Promises are awaited and the result is returned by value.
    ///
    /// # Errors
    ///
    /// - Any [`send_on_session`](Self::send_on_session) error
    /// - [`Error::ScriptException`] if the script threw
    async fn evaluate(
        &self,
        session_id: &SessionId,
        expression: &str,
        request_timeout: Duration,
    ) -> Result<Value> {
        let command = Command::Runtime(RuntimeCommand::Evaluate {
            expression: expression.to_string(),
            return_by_value: true,
            await_promise: true,
            user_gesture: true,
        });
        let mut result = self
            .send_on_session(session_id, command, request_timeout)
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::script_exception(exception_message(details)));
        }

        Ok(result
            .get_mut("result")
            .and_then(|remote| remote.get_mut("value"))
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    // ========================================================================
    // Trusted Input
    // ========================================================================

    /// Clicks at a point: move, press, release.
    ///
    /// # Errors
    ///
    /// Any [`send_on_session`](Self::send_on_session) error.
    async fn dispatch_mouse_click(
        &self,
        session_id: &SessionId,
        x: f64,
        y: f64,
        button: MouseButton,
        request_timeout: Duration,
    ) -> Result<()> {
        let steps = [
            (MouseEventType::Moved, MouseButton::None, 0),
            (MouseEventType::Pressed, button, 1),
            (MouseEventType::Released, button, 1),
        ];
        for (event_type, button, click_count) in steps {
            let command = Command::Input(InputCommand::DispatchMouseEvent {
                event_type,
                x,
                y,
                button,
                click_count,
            });
            self.send_on_session(session_id, command, request_timeout)
                .await?;
        }
        Ok(())
    }

    /// Dispatches one key event.
    ///
    /// # Errors
    ///
    /// Any [`send_on_session`](Self::send_on_session) error.
    async fn dispatch_key_event(
        &self,
        session_id: &SessionId,
        params: DispatchKeyEventParams,
        request_timeout: Duration,
    ) -> Result<()> {
        let command = Command::Input(InputCommand::DispatchKeyEvent(params));
        self.send_on_session(session_id, command, request_timeout)
            .await?;
        Ok(())
    }

    /// Presses and releases a key.
    ///
    /// # Errors
    ///
    /// Any [`send_on_session`](Self::send_on_session) error.
    async fn press_key(
        &self,
        session_id: &SessionId,
        key: Key,
        modifiers: Modifiers,
        request_timeout: Duration,
    ) -> Result<()> {
        self.dispatch_key_event(session_id, key.down_event(modifiers), request_timeout)
            .await?;
        self.dispatch_key_event(session_id, key.up_event(modifiers), request_timeout)
            .await
    }

    /// Inserts text at the focused element.
    ///
    /// # Errors
    ///
    /// Any [`send_on_session`](Self::send_on_session) error.
    async fn insert_text(
        &self,
        session_id: &SessionId,
        text: &str,
        request_timeout: Duration,
    ) -> Result<()> {
        let command = Command::Input(InputCommand::InsertText {
            text: text.to_string(),
        });
        self.send_on_session(session_id, command, request_timeout)
            .await?;
        Ok(())
    }
}

/// Best human-readable text from an `exceptionDetails` object.
fn exception_message(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("Script threw")
        .to_string()
}

// ============================================================================
// CdpClient
// ============================================================================

/// [`ProtocolClient`] over a single browser-level WebSocket.
///
/// Event handlers live in a registry owned by the client, so they survive
/// a reconnect.
pub struct CdpClient {
    /// HTTP discovery endpoint.
    discovery: Discovery,
    /// Handshake deadline.
    connect_timeout: Duration,
    /// Live connection, if any.
    connection: RwLock<Option<Connection>>,
    /// Serializes connect attempts.
    connect_gate: AsyncMutex<()>,
    /// Handlers shared with every connection.
    events: Arc<EventRegistry>,
}

impl fmt::Debug for CdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpClient")
            .field("endpoint", self.discovery.endpoint())
            .field("connected", &self.is_connected())
            .field("handlers", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl CdpClient {
    /// Creates a disconnected client for an `http(s)` discovery endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint is not http(s).
    pub fn new(endpoint: Url, connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            discovery: Discovery::new(endpoint, connect_timeout)?,
            connect_timeout,
            connection: RwLock::new(None),
            connect_gate: AsyncMutex::new(()),
            events: Arc::new(EventRegistry::new()),
        })
    }

    /// Fetches `/json/version`.
    ///
    /// # Errors
    ///
    /// See [`Discovery::version`].
    pub async fn version(&self) -> Result<VersionInfo> {
        self.discovery.version().await
    }

    /// Returns the number of requests awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.connection
            .read()
            .as_ref()
            .map_or(0, Connection::pending_count)
    }

    /// Sends a command that gives up early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] on cancellation
    /// - Any [`ProtocolClient::send`] error
    pub async fn send_cancellable(
        &self,
        session_id: Option<&SessionId>,
        command: Command,
        request_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let connection = self.live_connection()?;
        connection
            .send_cancellable(session_id.cloned(), command, request_timeout, cancel)
            .await
    }

    fn live_connection(&self) -> Result<Connection> {
        match self.connection.read().as_ref() {
            Some(connection) if connection.is_open() => Ok(connection.clone()),
            Some(_) => Err(Error::ConnectionClosed),
            None => Err(Error::NotConnected),
        }
    }
}

#[async_trait]
impl ProtocolClient for CdpClient {
    async fn connect(&self) -> Result<()> {
        let _gate = self.connect_gate.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let version = self.discovery.version().await?;
        let ws_url = version.web_socket_debugger_url;
        debug!(url = %ws_url, "Opening transport");

        let (ws_stream, _) = timeout(self.connect_timeout, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "Handshake with {ws_url} timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })??;

        let connection = Connection::new(ws_stream, Arc::clone(&self.events));
        let previous = self.connection.write().replace(connection);
        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        info!(url = %ws_url, browser = %version.browser, "Connected to browser");
        Ok(())
    }

    async fn close(&self) {
        let connection = self.connection.write().take();
        if let Some(connection) = connection {
            connection.shutdown().await;
            info!("Browser connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .is_some_and(Connection::is_open)
    }

    async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        self.discovery.list_targets().await
    }

    async fn send(&self, command: Command, request_timeout: Duration) -> Result<Value> {
        let connection = self.live_connection()?;
        connection.send(None, command, request_timeout).await
    }

    async fn send_on_session(
        &self,
        session_id: &SessionId,
        command: Command,
        request_timeout: Duration,
    ) -> Result<Value> {
        let connection = self.live_connection()?;
        connection
            .send(Some(session_id.clone()), command, request_timeout)
            .await
    }

    fn register_event_handler(&self, method: &str, handler: EventHandler) -> HandlerId {
        self.events.register(method, handler)
    }

    fn unregister_event_handler(&self, id: HandlerId) -> bool {
        self.events.unregister(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
