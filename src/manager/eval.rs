//! Script evaluation on charts.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::chart::decode_envelope;
use crate::error::{Error, Result};
use crate::identifiers::ChartId;

use super::core::ChartManager;

// ============================================================================
// ChartManager - Evaluation
// ============================================================================

impl ChartManager {
    /// Evaluates a page script on a chart and returns its envelope payload.
    ///
    /// The script must produce `{ok, data?, error_code?, error_message?}`,
    /// either as an object or as its JSON string.
    ///
    /// # Errors
    ///
    /// - [`Error::ChartNotFound`] if no tab maps to the chart (never retried)
    /// - [`Error::BackendUnavailable`] if the connection is broken and one
    ///   reconnect did not help
    /// - [`Error::EvaluationTimeout`] if the call deadline passed
    /// - [`Error::EvaluationFailed`] for script or protocol failures
    /// - The error the script reported via its envelope
    pub async fn eval_on_chart(&self, chart_id: &ChartId, script: &str) -> Result<Value> {
        self.eval_on_chart_with_timeout(chart_id, script, self.call_timeout())
            .await
    }

    /// Like [`eval_on_chart`](Self::eval_on_chart) with a caller deadline.
    ///
    /// # Errors
    ///
    /// See [`eval_on_chart`](Self::eval_on_chart).
    pub async fn eval_on_chart_with_timeout(
        &self,
        chart_id: &ChartId,
        script: &str,
        timeout: Duration,
    ) -> Result<Value> {
        if timeout.is_zero() {
            return Err(Error::validation("Evaluation timeout must be non-zero"));
        }

        let raw = self
            .run_on_chart(chart_id, "evaluate", |client, session_id| {
                let script = script.to_string();
                async move { client.evaluate(&session_id, &script, timeout).await }
            })
            .await?;

        debug!(chart_id = %chart_id, "Chart evaluation returned");
        decode_envelope(chart_id, raw)
    }

    /// Evaluates a script and decodes the envelope payload into `T`.
    ///
    /// # Errors
    ///
    /// As [`eval_on_chart`](Self::eval_on_chart), plus
    /// [`Error::EvaluationFailed`] if the payload does not fit `T`.
    pub async fn eval_on_chart_as<T: DeserializeOwned>(
        &self,
        chart_id: &ChartId,
        script: &str,
    ) -> Result<T> {
        let data = self.eval_on_chart(chart_id, script).await?;
        serde_json::from_value(data).map_err(|e| {
            Error::evaluation_caused_by(
                format!("Unexpected result shape from chart {chart_id}"),
                e.into(),
            )
        })
    }
}
