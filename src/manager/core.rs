//! Chart manager state, tab sync and the retrying operation path.
//!
//! # Locking
//!
//! | Lock | Guards | Held across I/O |
//! |------|--------|-----------------|
//! | `catalogue` | chart, tab and lock maps | never |
//! | `TabSession::token` | one target's session token | attach only |
//! | chart lock | one chart's operations | yes |
//! | `sync_gate` | tab syncs | yes |
//! | `reconnect_gate` | reconnects | yes |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::chart::{ActiveChartInfo, ChartInfo, ChartPattern, select_charts};
use crate::error::{Error, Result};
use crate::identifiers::{ChartId, ScreencastId, SessionId, TargetId};
use crate::screencast::ScreencastSession;
use crate::transport::ProtocolClient;

use super::builder::ManagerBuilder;
use super::config::ManagerConfig;
use super::retry::{RetryVerdict, retry_verdict};

// ============================================================================
// Types
// ============================================================================

/// Validated settings produced by [`ManagerBuilder`].
#[derive(Debug, Clone)]
pub(crate) struct ManagerSettings {
    pub url_filter: String,
    pub pattern: ChartPattern,
    pub call_timeout: Duration,
    pub screencast_dir: PathBuf,
}

/// A session token and the connection generation it was obtained on.
#[derive(Debug, Clone)]
struct CachedSession {
    session_id: SessionId,
    generation: u64,
}

/// Per-target record, refreshed in place on every sync.
pub(crate) struct TabSession {
    /// Latest descriptor.
    info: RwLock<ChartInfo>,
    /// Attached session; empty means not attached.
    token: AsyncMutex<Option<CachedSession>>,
}

impl TabSession {
    fn new(info: ChartInfo) -> Self {
        Self {
            info: RwLock::new(info),
            token: AsyncMutex::new(None),
        }
    }
}

/// Chart lookup result: the tab plus the chart's exclusive lock.
pub(crate) struct ResolvedChart {
    pub tab: Arc<TabSession>,
    pub lock: Arc<AsyncMutex<()>>,
}

/// Chart, tab and lock maps, mutated only under one lock.
#[derive(Default)]
struct Catalogue {
    charts: FxHashMap<ChartId, TargetId>,
    tabs: FxHashMap<TargetId, Arc<TabSession>>,
    locks: FxHashMap<ChartId, Arc<AsyncMutex<()>>>,
    /// Chart IDs in discovery order.
    order: Vec<ChartId>,
}

impl Catalogue {
    /// Replaces the maps with a fresh selection.
    ///
    /// Surviving targets keep their tab record and session token. Returns
    /// the chart IDs that disappeared.
    fn rebuild(&mut self, charts: &[ChartInfo]) -> Vec<ChartId> {
        let mut chart_map = FxHashMap::default();
        let mut tabs = FxHashMap::default();

        for chart in charts {
            let tab = match self.tabs.remove(&chart.target_id) {
                Some(tab) => {
                    *tab.info.write() = chart.clone();
                    tab
                }
                None => Arc::new(TabSession::new(chart.clone())),
            };
            tabs.insert(chart.target_id.clone(), tab);
            chart_map.insert(chart.chart_id.clone(), chart.target_id.clone());
        }

        let removed: Vec<ChartId> = self
            .charts
            .keys()
            .filter(|id| !chart_map.contains_key(*id))
            .cloned()
            .collect();

        self.locks.retain(|id, _| chart_map.contains_key(id));
        self.charts = chart_map;
        self.tabs = tabs;
        self.order = charts.iter().map(|c| c.chart_id.clone()).collect();

        removed
    }

    fn lookup(&mut self, chart_id: &ChartId) -> Option<ResolvedChart> {
        let target_id = self.charts.get(chart_id)?;
        let tab = Arc::clone(self.tabs.get(target_id)?);
        let lock = Arc::clone(self.locks.entry(chart_id.clone()).or_default());
        Some(ResolvedChart { tab, lock })
    }
}

/// A failed attempt and the connection generation it ran on.
struct AttemptFailure {
    error: Error,
    generation: u64,
}

/// Shared state behind every [`ChartManager`] clone.
pub(crate) struct ManagerInner {
    pub settings: ManagerSettings,
    pub client: Arc<dyn ProtocolClient>,
    catalogue: Mutex<Catalogue>,
    sync_gate: AsyncMutex<()>,
    reconnect_gate: AsyncMutex<()>,
    /// Bumped on every reconnect; older session tokens are stale.
    generation: AtomicU64,
    pub screencasts: Mutex<FxHashMap<ScreencastId, Arc<ScreencastSession>>>,
}

// ============================================================================
// ChartManager
// ============================================================================

/// Catalogue of chart tabs with per-chart serialized, retrying operations.
///
/// Cheap to clone; clones share state. Independent managers share nothing.
///
/// # Example
///
/// ```no_run
/// use chart_cdp::{ChartId, ChartManager};
///
/// # async fn example() -> chart_cdp::Result<()> {
/// let manager = ChartManager::builder().url_filter("chart").build()?;
/// manager.connect().await?;
///
/// for chart in manager.list_charts().await? {
///     println!("{} {}", chart.chart_id, chart.title);
/// }
///
/// let data = manager
///     .eval_on_chart(&ChartId::from("abc123"), "({ok: true, data: document.title})")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChartManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl fmt::Debug for ChartManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartManager")
            .field("url_filter", &self.inner.settings.url_filter)
            .field("pattern", &self.inner.settings.pattern.as_str())
            .field("chart_count", &self.inner.catalogue.lock().charts.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChartManager - Construction
// ============================================================================

impl ChartManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Builds a manager from plain configuration.
    ///
    /// # Errors
    ///
    /// See [`ManagerBuilder::build`].
    pub fn from_config(config: ManagerConfig) -> Result<Self> {
        ManagerBuilder::new().config(config).build()
    }

    pub(crate) fn new(settings: ManagerSettings, client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                client,
                catalogue: Mutex::new(Catalogue::default()),
                sync_gate: AsyncMutex::new(()),
                reconnect_gate: AsyncMutex::new(()),
                generation: AtomicU64::new(0),
                screencasts: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Returns the per-call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.inner.settings.call_timeout
    }

    /// Returns the protocol client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> Arc<dyn ProtocolClient> {
        Arc::clone(&self.inner.client)
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

// ============================================================================
// ChartManager - Connection
// ============================================================================

impl ChartManager {
    /// Connects to the browser and performs an initial tab sync.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if either step fails.
    pub async fn connect(&self) -> Result<()> {
        self.inner
            .client
            .connect()
            .await
            .map_err(|e| as_backend_unavailable("Connect to browser failed", e))?;

        let charts = self
            .sync_tabs()
            .await
            .map_err(|e| as_backend_unavailable("Initial tab sync failed", e))?;

        info!(charts = charts.len(), "Chart manager connected");
        Ok(())
    }

    /// Drops the transport and every cached session, then connects again.
    ///
    /// Active screencasts are aborted; their events were bound to the old
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the new connection fails.
    pub async fn reconnect(&self) -> Result<()> {
        let _gate = self.inner.reconnect_gate.lock().await;
        self.reconnect_locked().await
    }

    /// Reconnects unless another caller already did since `observed`.
    async fn reconnect_from(&self, observed: u64) -> Result<()> {
        let _gate = self.inner.reconnect_gate.lock().await;
        if self.generation() != observed {
            debug!(observed, "Reconnect already performed");
            return Ok(());
        }
        self.reconnect_locked().await
    }

    async fn reconnect_locked(&self) -> Result<()> {
        warn!("Reconnecting to browser");
        self.inner.client.close().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_all_screencasts().await;
        self.connect().await
    }

    /// Aborts screencasts and closes the transport.
    pub async fn close(&self) {
        self.abort_all_screencasts().await;
        self.inner.client.close().await;
        info!("Chart manager closed");
    }
}

// ============================================================================
// ChartManager - Catalogue
// ============================================================================

impl ChartManager {
    /// Lists chart tabs, sorted by chart ID.
    ///
    /// Always syncs first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if target discovery fails.
    pub async fn list_charts(&self) -> Result<Vec<ChartInfo>> {
        let mut charts = self
            .sync_tabs()
            .await
            .map_err(|e| as_backend_unavailable("Tab sync failed", e))?;
        charts.sort_by(|a, b| a.chart_id.cmp(&b.chart_id));
        Ok(charts)
    }

    /// Returns the chart the browser lists first, if any.
    ///
    /// Browsers list the most recently focused tab first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if target discovery fails.
    pub async fn active_chart(&self) -> Result<Option<ActiveChartInfo>> {
        self.sync_tabs()
            .await
            .map_err(|e| as_backend_unavailable("Tab sync failed", e))?;

        let first = {
            let mut catalogue = self.inner.catalogue.lock();
            let first = catalogue.order.first().cloned();
            first.and_then(|id| catalogue.lookup(&id))
        };
        let Some(resolved) = first else {
            return Ok(None);
        };

        let chart = resolved.tab.info.read().clone();
        let attached = self.cached_session(&resolved.tab).await.is_some();
        let screencast = self.active_screencast_for(&chart.chart_id);

        Ok(Some(ActiveChartInfo {
            chart,
            attached,
            screencast,
        }))
    }

    /// Rebuilds the catalogue from the browser's target list.
    ///
    /// Vanished charts lose their session, their lock entry and any
    /// screencast.
    pub(crate) async fn sync_tabs(&self) -> Result<Vec<ChartInfo>> {
        let _gate = self.inner.sync_gate.lock().await;

        let targets = self.inner.client.list_targets().await?;
        let charts = select_charts(
            &targets,
            &self.inner.settings.url_filter,
            &self.inner.settings.pattern,
        );

        let removed = self.inner.catalogue.lock().rebuild(&charts);
        debug!(
            targets = targets.len(),
            charts = charts.len(),
            removed = removed.len(),
            "Tabs synced"
        );

        for chart_id in &removed {
            self.abort_screencasts_for(chart_id).await;
        }

        Ok(charts)
    }

    fn lookup(&self, chart_id: &ChartId) -> Option<ResolvedChart> {
        self.inner.catalogue.lock().lookup(chart_id)
    }

    /// Resolves a chart, syncing once if it is not known yet.
    pub(crate) async fn resolve(&self, chart_id: &ChartId) -> Result<ResolvedChart> {
        if let Some(resolved) = self.lookup(chart_id) {
            return Ok(resolved);
        }

        self.sync_tabs()
            .await
            .map_err(|e| as_backend_unavailable("Tab sync failed", e))?;

        self.lookup(chart_id)
            .ok_or_else(|| Error::chart_not_found(chart_id.clone()))
    }
}

// ============================================================================
// ChartManager - Sessions
// ============================================================================

impl ChartManager {
    /// Returns the chart's session token, attaching if needed.
    ///
    /// Repeated calls return the same token until it is invalidated.
    ///
    /// # Errors
    ///
    /// - [`Error::ChartNotFound`] if no tab maps to the chart
    /// - Boundary-wrapped attach errors
    pub async fn session_for_chart(&self, chart_id: &ChartId) -> Result<SessionId> {
        let resolved = self.resolve(chart_id).await?;
        self.attached_session(&resolved.tab)
            .await
            .map_err(|e| wrap_failure(chart_id, "attach", e))
    }

    /// Clears the chart's cached session so the next operation re-attaches.
    ///
    /// Returns `true` if a session was cached.
    pub async fn invalidate_chart_session(&self, chart_id: &ChartId) -> bool {
        let Some(resolved) = self.lookup(chart_id) else {
            return false;
        };
        let dropped = resolved.tab.token.lock().await.take();
        let cleared = dropped.is_some();
        if let Some(cached) = dropped {
            debug!(chart_id = %chart_id, "Chart session invalidated");
            self.release_session(cached.session_id, cached.generation);
        }
        cleared
    }

    /// Detaches a dropped session in the background.
    ///
    /// Skipped for tokens from an older connection, which died with it, and
    /// for sessions an active screencast still reads frames from.
    pub(crate) fn release_session(&self, session_id: SessionId, generation: u64) {
        if generation != self.generation() || self.screencast_uses(&session_id) {
            return;
        }

        let client = Arc::clone(&self.inner.client);
        let timeout = self.inner.settings.call_timeout;
        tokio::spawn(async move {
            match client.detach_from_target(&session_id, timeout).await {
                Ok(()) => debug!(session_id = %session_id, "Detached session"),
                Err(e) => debug!(session_id = %session_id, error = %e, "Session detach failed"),
            }
        });
    }

    /// Returns `true` if `session_id` is the chart's cached session.
    pub(crate) async fn caches_session(&self, chart_id: &ChartId, session_id: &SessionId) -> bool {
        let Some(resolved) = self.lookup(chart_id) else {
            return false;
        };
        resolved
            .tab
            .token
            .lock()
            .await
            .as_ref()
            .is_some_and(|cached| &cached.session_id == session_id)
    }

    fn screencast_uses(&self, session_id: &SessionId) -> bool {
        self.inner
            .screencasts
            .lock()
            .values()
            .any(|s| s.is_active() && s.session_id() == session_id)
    }

    async fn cached_session(&self, tab: &TabSession) -> Option<SessionId> {
        let generation = self.generation();
        tab.token
            .lock()
            .await
            .as_ref()
            .filter(|cached| cached.generation == generation)
            .map(|cached| cached.session_id.clone())
    }

    /// Returns the cached token or attaches under the tab's own lock.
    pub(crate) async fn attached_session(&self, tab: &TabSession) -> Result<SessionId> {
        let generation = self.generation();
        let mut token = tab.token.lock().await;

        if let Some(cached) = token.as_ref()
            && cached.generation == generation
        {
            return Ok(cached.session_id.clone());
        }

        let target_id = tab.info.read().target_id.clone();
        let session_id = self
            .inner
            .client
            .attach_to_target(&target_id, self.inner.settings.call_timeout)
            .await?;

        debug!(target_id = %target_id, session_id = %session_id, "Attached to target");
        *token = Some(CachedSession {
            session_id: session_id.clone(),
            generation,
        });
        Ok(session_id)
    }
}

// ============================================================================
// ChartManager - Retrying Operation Path
// ============================================================================

impl ChartManager {
    /// Runs `op` on the chart's session under the chart lock.
    ///
    /// On failure the error is classified once: backend-unavailable triggers
    /// a reconnect, a transient evaluation failure triggers a tab resync,
    /// and either is followed by exactly one more attempt. Anything else is
    /// returned as is.
    pub(crate) async fn run_on_chart<T, F, Fut>(
        &self,
        chart_id: &ChartId,
        operation: &str,
        op: F,
    ) -> Result<T>
    where
        F: Fn(Arc<dyn ProtocolClient>, SessionId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let failure = match self.attempt(chart_id, operation, &op).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        match retry_verdict(&failure.error) {
            RetryVerdict::NoRetry => return Err(failure.error),
            RetryVerdict::Reconnect => {
                warn!(chart_id = %chart_id, operation, error = %failure.error, "Backend unavailable, reconnecting");
                self.reconnect_from(failure.generation).await?;
            }
            RetryVerdict::ResyncTabs => {
                debug!(chart_id = %chart_id, operation, error = %failure.error, "Transient failure, resyncing tabs");
                self.sync_tabs()
                    .await
                    .map_err(|e| as_backend_unavailable("Tab sync failed", e))?;
            }
        }

        self.attempt(chart_id, operation, &op)
            .await
            .map_err(|failure| failure.error)
    }

    async fn attempt<T, F, Fut>(
        &self,
        chart_id: &ChartId,
        operation: &str,
        op: &F,
    ) -> std::result::Result<T, AttemptFailure>
    where
        F: Fn(Arc<dyn ProtocolClient>, SessionId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let generation = self.generation();
        let fail = |error: Error| AttemptFailure { error, generation };

        let resolved = self.resolve(chart_id).await.map_err(fail)?;
        let _guard = resolved.lock.lock().await;

        let session_id = self
            .attached_session(&resolved.tab)
            .await
            .map_err(|e| fail(wrap_failure(chart_id, "attach", e)))?;

        match op(Arc::clone(&self.inner.client), session_id).await {
            Ok(value) => Ok(value),
            Err(e) => {
                let dropped = resolved.tab.token.lock().await.take();
                if let Some(cached) = dropped {
                    self.release_session(cached.session_id, cached.generation);
                }
                Err(fail(wrap_failure(chart_id, operation, e)))
            }
        }
    }
}

// ============================================================================
// Error Wrapping
// ============================================================================

/// Wraps a transport error into a boundary error. Boundary errors pass
/// through unchanged.
pub(crate) fn wrap_failure(chart_id: &ChartId, operation: &str, error: Error) -> Error {
    match error {
        Error::Validation { .. }
        | Error::Config { .. }
        | Error::ChartNotFound { .. }
        | Error::BackendUnavailable { .. }
        | Error::EvaluationFailed { .. }
        | Error::EvaluationTimeout { .. }
        | Error::PageApiUnavailable { .. } => error,
        Error::RequestTimeout { timeout_ms, .. } => {
            Error::evaluation_timeout(chart_id.clone(), timeout_ms)
        }
        e if e.is_connection_error() => {
            Error::backend_unavailable(format!("{operation} on chart {chart_id}"), e)
        }
        e => Error::evaluation_caused_by(format!("{operation} on chart {chart_id} failed"), e),
    }
}

/// Wraps a connect or discovery error as backend-unavailable.
pub(crate) fn as_backend_unavailable(context: &str, error: Error) -> Error {
    match error {
        Error::BackendUnavailable { .. } => error,
        e => Error::backend_unavailable(context, e),
    }
}

// ============================================================================
// Tests
// ============================================================================
