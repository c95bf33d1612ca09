//! Screencast registry.
//!
//! At most one active capture per chart. Stopped captures stay listed with
//! their final frame count until forgotten.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identifiers::{ChartId, ScreencastId};
use crate::screencast::{ScreencastInfo, ScreencastOptions, ScreencastSession};

use super::core::{ChartManager, wrap_failure};

// ============================================================================
// ChartManager - Screencast
// ============================================================================

impl ChartManager {
    /// Starts capturing a chart into numbered image files.
    ///
    /// Frames go to `options.output_dir`, or to
    /// `<screencast_dir>/<chart_id>-<screencast_id>` by default. The capture
    /// uses the chart's cached session.
    ///
    /// # Errors
    ///
    /// - [`Error::ChartNotFound`] if no tab maps to the chart
    /// - [`Error::Validation`] if the chart already has an active capture
    /// - Boundary-wrapped attach and start errors
    pub async fn start_screencast(
        &self,
        chart_id: &ChartId,
        options: ScreencastOptions,
    ) -> Result<ScreencastInfo> {
        let resolved = self.resolve(chart_id).await?;
        let _guard = resolved.lock.lock().await;

        if let Some(existing) = self.active_screencast_for(chart_id) {
            return Err(Error::validation(format!(
                "Chart {chart_id} already has an active screencast: {existing}"
            )));
        }

        let session_id = self
            .attached_session(&resolved.tab)
            .await
            .map_err(|e| wrap_failure(chart_id, "attach", e))?;

        let id = ScreencastId::generate();
        let output_dir = options.output_dir.clone().unwrap_or_else(|| {
            self.inner
                .settings
                .screencast_dir
                .join(format!("{chart_id}-{id}"))
        });

        let session = ScreencastSession::start(
            self.client(),
            id,
            chart_id.clone(),
            session_id,
            &options,
            output_dir,
            self.call_timeout(),
        )
        .await
        .map_err(|e| wrap_failure(chart_id, "start screencast", e))?;

        let info = session.info();
        self.inner.screencasts.lock().insert(id, session);
        Ok(info)
    }

    /// Stops a capture and returns its final snapshot.
    ///
    /// Stopping an already stopped capture returns the same snapshot. If the
    /// chart's session was invalidated during the capture, the capture's
    /// session is detached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown screencast ID.
    pub async fn stop_screencast(&self, id: ScreencastId) -> Result<ScreencastInfo> {
        let session = self
            .inner
            .screencasts
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::validation(format!("Unknown screencast: {id}")))?;

        let was_active = session.is_active();
        let info = session.stop(self.call_timeout()).await;
        if was_active
            && !self
                .caches_session(session.chart_id(), session.session_id())
                .await
        {
            self.release_session(session.session_id().clone(), self.generation());
        }
        Ok(info)
    }

    /// Removes a stopped capture from the registry and returns its final
    /// snapshot. Frame files stay on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown or still active capture.
    pub fn forget_screencast(&self, id: ScreencastId) -> Result<ScreencastInfo> {
        let mut screencasts = self.inner.screencasts.lock();
        let session = screencasts
            .get(&id)
            .ok_or_else(|| Error::validation(format!("Unknown screencast: {id}")))?;
        if session.is_active() {
            return Err(Error::validation(format!(
                "Screencast {id} is still active; stop it first"
            )));
        }
        let info = session.info();
        screencasts.remove(&id);
        Ok(info)
    }

    /// Lists every capture, oldest first.
    #[must_use]
    pub fn list_screencasts(&self) -> Vec<ScreencastInfo> {
        let mut infos: Vec<ScreencastInfo> = self
            .inner
            .screencasts
            .lock()
            .values()
            .map(|session| session.info())
            .collect();
        infos.sort_by(|a, b| {
            a.started_at_ms
                .cmp(&b.started_at_ms)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        infos
    }

    /// Returns the chart's active capture, if any.
    pub(crate) fn active_screencast_for(&self, chart_id: &ChartId) -> Option<ScreencastId> {
        self.inner
            .screencasts
            .lock()
            .values()
            .find(|session| session.chart_id() == chart_id && session.is_active())
            .map(|session| session.id())
    }

    /// Aborts the chart's captures without contacting the browser.
    pub(crate) async fn abort_screencasts_for(&self, chart_id: &ChartId) {
        let sessions = self.sessions_matching(|session| session.chart_id() == chart_id);
        for session in sessions {
            session.abort().await;
        }
    }

    /// Aborts every active capture without contacting the browser.
    pub(crate) async fn abort_all_screencasts(&self) {
        for session in self.sessions_matching(|_| true) {
            session.abort().await;
        }
    }

    fn sessions_matching(
        &self,
        predicate: impl Fn(&ScreencastSession) -> bool,
    ) -> Vec<Arc<ScreencastSession>> {
        self.inner
            .screencasts
            .lock()
            .values()
            .filter(|session| session.is_active() && predicate(session))
            .cloned()
            .collect()
    }
}
