//! Drawing z-order actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Z-order change requested for a drawing on a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrderAction {
    /// Move above every other drawing.
    BringToFront,
    /// Move up one step.
    BringForward,
    /// Move down one step.
    SendBackward,
    /// Move below every other drawing.
    SendToBack,
}

impl ZOrderAction {
    /// Returns the action the page scripts actually perform.
    ///
    /// Single-step moves are not reliable in the chart's scripting context,
    /// so `BringForward` acts as `BringToFront` and `SendBackward` as
    /// `SendToBack`. This is a best-effort approximation.
    #[must_use]
    pub fn effective(self) -> Self {
        match self {
            Self::BringToFront | Self::BringForward => Self::BringToFront,
            Self::SendToBack | Self::SendBackward => Self::SendToBack,
        }
    }

    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BringToFront => "bring_to_front",
            Self::BringForward => "bring_forward",
            Self::SendBackward => "send_backward",
            Self::SendToBack => "send_to_back",
        }
    }
}

impl fmt::Display for ZOrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZOrderAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bring_to_front" => Ok(Self::BringToFront),
            "bring_forward" => Ok(Self::BringForward),
            "send_backward" => Ok(Self::SendBackward),
            "send_to_back" => Ok(Self::SendToBack),
            other => Err(Error::validation(format!("Unknown z-order action: {other}"))),
        }
    }
}
