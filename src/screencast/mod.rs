//! Screencast frame pipeline.
//!
//! Streams captured frames from a chart tab into numbered image files under
//! acknowledgment-based backpressure.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `format` | `ImageFormat`, `ScreencastOptions` |
//! | `session` | Capture session: handler, bounded queue, worker |

// ============================================================================
// Submodules
// ============================================================================

mod format;
mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use format::{ImageFormat, ScreencastOptions};
pub use session::{
    ACK_TIMEOUT, DRAIN_GRACE, FRAME_QUEUE_CAPACITY, ScreencastInfo, ScreencastSession,
    ScreencastStatus, frame_path,
};
