//! Screencast capture session.
//!
//! # Frame Flow
//!
//! ```text
//! receive loop ──► handler ──try_send──► bounded queue ──► worker
//!                     │                                      │
//!                     └─ queue full: detached ack            ├─ ack
//!                                                            └─ decode + write
//! ```
//!
//! The handler runs on the receive loop and never waits: a full queue drops
//! the payload but still acknowledges the frame from a short-lived task, so
//! the browser keeps sending. The worker acknowledges before touching disk.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::identifiers::{ChartId, HandlerId, ScreencastId, SessionId};
use crate::protocol::event::SCREENCAST_FRAME;
use crate::protocol::{Command, Event, PageCommand, ScreencastFrame};
use crate::transport::{EventHandler, ProtocolClient};

use super::format::{ImageFormat, ScreencastOptions};

// ============================================================================
// Constants
// ============================================================================

/// Frames buffered between the handler and the worker.
pub const FRAME_QUEUE_CAPACITY: usize = 32;

/// Deadline for one frame acknowledgment.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the worker keeps draining queued frames after stop.
pub const DRAIN_GRACE: Duration = Duration::from_secs(3);

// ============================================================================
// Status & Info
// ============================================================================

/// Lifecycle state of a screencast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreencastStatus {
    /// Frames are being captured.
    Active,
    /// Capture has ended; the frame count is final.
    Stopped,
}

/// Snapshot of a screencast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreencastInfo {
    /// Capture ID.
    pub id: ScreencastId,
    /// Chart being captured.
    pub chart_id: ChartId,
    /// Current state.
    pub status: ScreencastStatus,
    /// Directory holding the frame files.
    pub output_dir: PathBuf,
    /// Frame file extension.
    pub format: &'static str,
    /// Frames written to disk.
    pub frame_count: u64,
    /// Frames whose payload was dropped on a full queue.
    pub dropped_frames: u64,
    /// Start time, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    /// Stop time, milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at_ms: Option<u64>,
}

// ============================================================================
// FrameCounters
// ============================================================================

/// Counters shared by the handler, the worker and ack tasks.
#[derive(Debug, Default)]
struct FrameCounters {
    received: AtomicU64,
    acked: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
}

// ============================================================================
// ScreencastSession
// ============================================================================

/// One running (or finished) screencast capture.
pub struct ScreencastSession {
    id: ScreencastId,
    chart_id: ChartId,
    session_id: SessionId,
    output_dir: PathBuf,
    format: ImageFormat,
    client: Arc<dyn ProtocolClient>,
    counters: Arc<FrameCounters>,
    status: Mutex<ScreencastStatus>,
    started_at_ms: u64,
    stopped_at_ms: Mutex<Option<u64>>,
    handler_id: Mutex<Option<HandlerId>>,
    /// Completion signal for the worker.
    done: CancellationToken,
    /// Set by the first stop/abort.
    stopping: AtomicBool,
    /// Worker handle; the lock is held while joining.
    worker: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ScreencastSession {
    /// Starts capturing frames from an attached session into `output_dir`.
    ///
    /// The handler and worker are in place before the browser is asked to
    /// start, so no early frame is missed.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if the output directory cannot be
    ///   created
    /// - Any error from `Page.startScreencast`; the session is torn down
    pub async fn start(
        client: Arc<dyn ProtocolClient>,
        id: ScreencastId,
        chart_id: ChartId,
        session_id: SessionId,
        options: &ScreencastOptions,
        output_dir: PathBuf,
        request_timeout: Duration,
    ) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&output_dir).await?;

        let (tx, rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let session = Arc::new(Self {
            id,
            chart_id,
            session_id,
            output_dir,
            format: options.format,
            client,
            counters: Arc::new(FrameCounters::default()),
            status: Mutex::new(ScreencastStatus::Active),
            started_at_ms: unix_millis(),
            stopped_at_ms: Mutex::new(None),
            handler_id: Mutex::new(None),
            done: CancellationToken::new(),
            stopping: AtomicBool::new(false),
            worker: AsyncMutex::new(None),
        });

        let handler_id = session
            .client
            .register_event_handler(SCREENCAST_FRAME, session.frame_handler(tx));
        *session.handler_id.lock() = Some(handler_id);

        let worker = tokio::spawn(run_worker(
            rx,
            FrameWriter {
                id,
                client: Arc::clone(&session.client),
                session_id: session.session_id.clone(),
                output_dir: session.output_dir.clone(),
                format: session.format,
                counters: Arc::clone(&session.counters),
            },
            session.done.clone(),
        ));
        *session.worker.lock().await = Some(worker);

        let command = Command::Page(PageCommand::StartScreencast {
            format: options.format.protocol_name().to_string(),
            quality: options.format.quality(),
            max_width: options.max_width,
            max_height: options.max_height,
            every_nth_frame: options.every_nth_frame,
        });
        if let Err(e) = session
            .client
            .send_on_session(&session.session_id, command, request_timeout)
            .await
        {
            session.abort().await;
            return Err(e);
        }

        info!(
            screencast = %id,
            chart_id = %session.chart_id,
            dir = %session.output_dir.display(),
            "Screencast started"
        );
        Ok(session)
    }

    /// Returns the capture ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ScreencastId {
        self.id
    }

    /// Returns the captured chart.
    #[inline]
    #[must_use]
    pub fn chart_id(&self) -> &ChartId {
        &self.chart_id
    }

    /// Returns the session the frames arrive on.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns `true` until the first stop or abort.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.status.lock() == ScreencastStatus::Active
    }

    /// Returns the number of acknowledged frames.
    #[must_use]
    pub fn acked_frames(&self) -> u64 {
        self.counters.acked.load(Ordering::SeqCst)
    }

    /// Returns the number of frame events received.
    #[must_use]
    pub fn received_frames(&self) -> u64 {
        self.counters.received.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the capture.
    #[must_use]
    pub fn info(&self) -> ScreencastInfo {
        ScreencastInfo {
            id: self.id,
            chart_id: self.chart_id.clone(),
            status: *self.status.lock(),
            output_dir: self.output_dir.clone(),
            format: self.format.extension(),
            frame_count: self.counters.written.load(Ordering::SeqCst),
            dropped_frames: self.counters.dropped.load(Ordering::SeqCst),
            started_at_ms: self.started_at_ms,
            stopped_at_ms: *self.stopped_at_ms.lock(),
        }
    }

    /// Asks the browser to stop pushing frames, then tears down.
    ///
    /// A failed stop request is logged; teardown proceeds regardless.
    /// Calling again returns the same final snapshot.
    pub async fn stop(&self, request_timeout: Duration) -> ScreencastInfo {
        if self.is_active() {
            let command = Command::Page(PageCommand::StopScreencast);
            if let Err(e) = self
                .client
                .send_on_session(&self.session_id, command, request_timeout)
                .await
            {
                debug!(screencast = %self.id, error = %e, "Stop request failed");
            }
        }
        self.abort().await
    }

    /// Tears down without contacting the browser.
    ///
    /// Unregisters the handler, signals the worker, and waits for it to drain
    /// and exit. Concurrent callers wait for the first one to finish.
    pub async fn abort(&self) -> ScreencastInfo {
        let mut worker = self.worker.lock().await;

        if !self.stopping.swap(true, Ordering::SeqCst) {
            if let Some(handler_id) = self.handler_id.lock().take() {
                self.client.unregister_event_handler(handler_id);
            }
            *self.status.lock() = ScreencastStatus::Stopped;
            *self.stopped_at_ms.lock() = Some(unix_millis());
            self.done.cancel();

            if let Some(handle) = worker.take()
                && let Err(e) = handle.await
            {
                warn!(screencast = %self.id, error = %e, "Screencast worker panicked");
            }

            info!(
                screencast = %self.id,
                chart_id = %self.chart_id,
                frames = self.counters.written.load(Ordering::SeqCst),
                dropped = self.counters.dropped.load(Ordering::SeqCst),
                "Screencast stopped"
            );
        }

        drop(worker);
        self.info()
    }

    /// Builds the receive-loop handler. Never blocks.
    fn frame_handler(&self, tx: mpsc::Sender<ScreencastFrame>) -> EventHandler {
        let id = self.id;
        let session_id = self.session_id.clone();
        let client = Arc::clone(&self.client);
        let counters = Arc::clone(&self.counters);

        Arc::new(move |event: &Event| {
            if !event.is_for_session(&session_id) {
                return;
            }
            let frame: ScreencastFrame = match serde_json::from_value(event.params.clone()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(screencast = %id, error = %e, "Malformed screencast frame");
                    return;
                }
            };
            counters.received.fetch_add(1, Ordering::SeqCst);

            if let Err(err) = tx.try_send(frame) {
                let (TrySendError::Full(frame) | TrySendError::Closed(frame)) = err;
                counters.dropped.fetch_add(1, Ordering::SeqCst);
                warn!(screencast = %id, frame = frame.frame_session, "Frame queue full, payload dropped");
                spawn_ack(
                    Arc::clone(&client),
                    session_id.clone(),
                    frame.frame_session,
                    Arc::clone(&counters),
                );
            }
        })
    }
}

// ============================================================================
// Acknowledgment
// ============================================================================

async fn ack_frame(
    client: &dyn ProtocolClient,
    session_id: &SessionId,
    frame: i64,
    counters: &FrameCounters,
) {
    let command = Command::Page(PageCommand::ScreencastFrameAck {
        frame_session: frame,
    });
    match client.send_on_session(session_id, command, ACK_TIMEOUT).await {
        Ok(_) => {
            counters.acked.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => warn!(frame, error = %e, "Frame ack failed"),
    }
}

/// Acknowledges a dropped frame from a detached task bounded by [`ACK_TIMEOUT`].
fn spawn_ack(
    client: Arc<dyn ProtocolClient>,
    session_id: SessionId,
    frame: i64,
    counters: Arc<FrameCounters>,
) {
    tokio::spawn(async move {
        ack_frame(client.as_ref(), &session_id, frame, &counters).await;
    });
}

// ============================================================================
// Worker
// ============================================================================

/// Everything the worker needs to ack and persist frames.
struct FrameWriter {
    id: ScreencastId,
    client: Arc<dyn ProtocolClient>,
    session_id: SessionId,
    output_dir: PathBuf,
    format: ImageFormat,
    counters: Arc<FrameCounters>,
}

impl FrameWriter {
    async fn process(&self, frame: ScreencastFrame) {
        self.ack(frame.frame_session).await;
        self.write(frame).await;
    }

    async fn ack(&self, frame: i64) {
        ack_frame(self.client.as_ref(), &self.session_id, frame, &self.counters).await;
    }

    /// Acks from a detached task; the frame is counted as dropped.
    fn abandon(&self, frame: i64) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        spawn_ack(
            Arc::clone(&self.client),
            self.session_id.clone(),
            frame,
            Arc::clone(&self.counters),
        );
    }

    /// Decodes and persists an acked frame. A failed write gives its number
    /// back so files stay contiguous.
    async fn write(&self, frame: ScreencastFrame) {
        let bytes = match BASE64.decode(frame.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(screencast = %self.id, frame = frame.frame_session, error = %e, "Frame decode failed");
                return;
            }
        };

        let number = self.counters.written.fetch_add(1, Ordering::SeqCst) + 1;
        let path = frame_path(&self.output_dir, number, self.format);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            self.counters.written.fetch_sub(1, Ordering::SeqCst);
            warn!(screencast = %self.id, path = %path.display(), error = %e, "Frame write failed");
            return;
        }
        trace!(screencast = %self.id, number, "Frame written");
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<ScreencastFrame>,
    writer: FrameWriter,
    done: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = done.cancelled() => break,

            frame = rx.recv() => match frame {
                Some(frame) => writer.process(frame).await,
                None => break,
            },
        }
    }

    // Drain what was already queued. Every frame is acked; past the grace
    // window the rest are acked without being written.
    rx.close();
    let deadline = Instant::now() + DRAIN_GRACE;
    let mut drained = 0usize;
    let mut abandoned = 0usize;
    while let Some(frame) = rx.recv().await {
        if Instant::now() >= deadline {
            writer.abandon(frame.frame_session);
            abandoned += 1;
            continue;
        }
        writer.ack(frame.frame_session).await;
        if timeout_at(deadline, writer.write(frame)).await.is_err() {
            warn!(screencast = %writer.id, "Drain grace elapsed mid-write");
        }
        drained += 1;
    }

    if abandoned > 0 {
        warn!(screencast = %writer.id, abandoned, "Drain grace elapsed, remaining frames acked unwritten");
    }
    debug!(screencast = %writer.id, drained, "Screencast worker exited");
}

/// Returns the path of the `number`-th frame, e.g. `frame_000001.png`.
#[must_use]
pub fn frame_path(dir: &Path, number: u64, format: ImageFormat) -> PathBuf {
    dir.join(format!("frame_{number:06}.{}", format.extension()))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// ============================================================================
// Tests
// ============================================================================
