//! WebSocket connection and receive loop.
//!
//! This module owns one transport connection to the browser, including
//! request/response correlation and event routing.
//!
//! # Receive Loop
//!
//! The connection spawns a tokio task that is the sole reader of the socket:
//!
//! - Messages with an `id` fulfill the matching pending reply slot
//! - Messages without an `id` are forwarded to the [`EventRegistry`]
//! - No application work runs on the loop; handlers must not block
//!
//! Writes go through a mutex-guarded sink so concurrent senders interleave
//! without passing through the loop. When the loop ends, every pending slot
//! is completed with [`Error::ConnectionClosed`].

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};
use crate::protocol::{Command, Event, Request, Response};

use super::events::EventRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
pub const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Map of request IDs to reply slots.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

// ============================================================================
// PendingSlot
// ============================================================================

/// Removes a reply slot when the waiting caller gives up.
///
/// Covers timeout, explicit cancellation and a dropped send future alike.
/// A reply that arrives afterwards finds no slot and is dropped.
struct PendingSlot<'a> {
    id: RequestId,
    correlation: &'a Mutex<CorrelationMap>,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.correlation.lock().remove(&self.id).is_some() {
            trace!(request_id = %self.id, "Removed abandoned reply slot");
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Shared state between handles and the receive loop.
struct ConnectionInner {
    /// Write half, one writer at a time.
    writer: AsyncMutex<WsSink>,
    /// Pending reply slots (shared with receive loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Next request number.
    next_id: AtomicU64,
    /// Set once the receive loop has ended.
    closed: Arc<AtomicBool>,
    /// Stops the receive loop.
    shutdown: CancellationToken,
}

/// WebSocket connection to the browser's debugging endpoint.
///
/// Cheap to clone; all clones share the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Wraps an open WebSocket stream and spawns the receive loop.
    pub(crate) fn new(ws_stream: WsStream, events: Arc<EventRegistry>) -> Self {
        let (writer, reader) = ws_stream.split();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        tokio::spawn(Self::run_receive_loop(
            reader,
            Arc::clone(&correlation),
            events,
            Arc::clone(&closed),
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(ConnectionInner {
                writer: AsyncMutex::new(writer),
                correlation,
                next_id: AtomicU64::new(1),
                closed,
                shutdown,
            }),
        }
    }

    /// Returns `true` while the receive loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.lock().len()
    }

    /// Sends a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    /// - [`Error::RequestTimeout`] if no reply arrives within `request_timeout`
    /// - [`Error::Remote`] if the browser answers with an error object
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send(
        &self,
        session_id: Option<SessionId>,
        command: Command,
        request_timeout: Duration,
    ) -> Result<Value> {
        self.exchange(session_id, command, request_timeout, None)
            .await
    }

    /// Like [`send`](Self::send), but gives up early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`Error::Cancelled`] on cancellation.
    pub async fn send_cancellable(
        &self,
        session_id: Option<SessionId>,
        command: Command,
        request_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.exchange(session_id, command, request_timeout, Some(cancel))
            .await
    }

    /// Closes the socket and stops the receive loop.
    ///
    /// Pending requests complete with [`Error::ConnectionClosed`]. Safe to
    /// call repeatedly.
    pub async fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        debug!("Connection shutdown requested");
        self.inner.shutdown.cancel();
        let _ = self.inner.writer.lock().await.close().await;
    }

    async fn exchange(
        &self,
        session_id: Option<SessionId>,
        command: Command,
        request_timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let id = RequestId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let request = match session_id {
            Some(session_id) => Request::on_session(id, session_id, command),
            None => Request::new(id, command),
        };
        let method = request.method();
        let json = to_string(&request)?;

        let (response_tx, response_rx) = oneshot::channel();
        {
            let mut correlation = self.inner.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
            correlation.insert(id, response_tx);
        }
        let _slot = PendingSlot {
            id,
            correlation: &self.inner.correlation,
        };

        // The loop may have drained the table between the check and insert.
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        {
            let mut writer = self.inner.writer.lock().await;
            writer
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| Error::connection(format!("Failed to send {method}: {e}")))?;
        }
        trace!(request_id = %id, method, "Request sent");

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            outcome = timeout(request_timeout, response_rx) => match outcome {
                Ok(Ok(result)) => result?.into_result(),
                Ok(Err(_)) => Err(Error::ConnectionClosed),
                Err(_) => {
                    debug!(request_id = %id, method, "Request timed out");
                    Err(Error::request_timeout(id, request_timeout.as_millis() as u64))
                }
            },
            () = cancelled => {
                debug!(request_id = %id, method, "Request cancelled");
                Err(Error::Cancelled { request_id: id })
            }
        }
    }

    /// Receive loop: sole reader of the socket.
    async fn run_receive_loop(
        mut reader: WsSource,
        correlation: Arc<Mutex<CorrelationMap>>,
        events: Arc<EventRegistry>,
        closed: Arc<AtomicBool>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Receive loop stopping on shutdown");
                    break;
                }

                message = reader.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &events);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        shutdown.cancel();
        Self::fail_pending_requests(&correlation);

        debug!("Receive loop terminated");
    }

    /// Routes one inbound message to a reply slot or to event handlers.
    fn handle_incoming_message(
        text: &str,
        correlation: &Mutex<CorrelationMap>,
        events: &EventRegistry,
    ) {
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(response));
                }
                None => trace!(id = %response.id, "Reply for abandoned request dropped"),
            }
            return;
        }

        if let Ok(event) = from_str::<Event>(text) {
            let delivered = events.dispatch(&event);
            trace!(method = %event.method, delivered, "Event dispatched");
            return;
        }

        warn!(len = text.len(), "Failed to parse incoming message");
    }

    /// Completes every pending slot with [`Error::ConnectionClosed`].
    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on close");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
