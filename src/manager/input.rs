//! Trusted input on charts.
//!
//! Input goes through the protocol's input domain on the chart's attached
//! session, so the page sees it as real user input.

use crate::error::{Error, Result};
use crate::identifiers::ChartId;
use crate::protocol::{Key, Modifiers, MouseButton};

use super::core::ChartManager;

impl ChartManager {
    /// Clicks at viewport coordinates on a chart.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for non-finite or negative coordinates
    /// - Same resolve/retry errors as
    ///   [`eval_on_chart`](Self::eval_on_chart)
    pub async fn click_on_chart(
        &self,
        chart_id: &ChartId,
        x: f64,
        y: f64,
        button: MouseButton,
    ) -> Result<()> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return Err(Error::validation(format!(
                "Click coordinates must be finite and non-negative, got ({x}, {y})"
            )));
        }

        let timeout = self.call_timeout();
        self.run_on_chart(chart_id, "click", |client, session_id| async move {
            client
                .dispatch_mouse_click(&session_id, x, y, button, timeout)
                .await
        })
        .await
    }

    /// Presses and releases a key on a chart.
    ///
    /// # Errors
    ///
    /// Same resolve/retry errors as [`eval_on_chart`](Self::eval_on_chart).
    pub async fn press_key_on_chart(
        &self,
        chart_id: &ChartId,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<()> {
        let timeout = self.call_timeout();
        self.run_on_chart(chart_id, "press key", |client, session_id| async move {
            client
                .press_key(&session_id, key, modifiers, timeout)
                .await
        })
        .await
    }

    /// Types text into the focused element of a chart.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for empty text
    /// - Same resolve/retry errors as
    ///   [`eval_on_chart`](Self::eval_on_chart)
    pub async fn type_on_chart(&self, chart_id: &ChartId, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(Error::validation("Text to type must not be empty"));
        }

        let timeout = self.call_timeout();
        self.run_on_chart(chart_id, "insert text", |client, session_id| {
            let text = text.to_string();
            async move { client.insert_text(&session_id, &text, timeout).await }
        })
        .await
    }
}
