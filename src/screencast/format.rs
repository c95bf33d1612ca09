//! Screencast capture options.

use std::path::PathBuf;

// ============================================================================
// ImageFormat
// ============================================================================

/// Image format for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless, larger files).
    #[default]
    Png,
    /// JPEG format with quality (0-100).
    Jpeg(u8),
}

impl ImageFormat {
    /// Creates PNG format.
    #[inline]
    #[must_use]
    pub fn png() -> Self {
        Self::Png
    }

    /// Creates JPEG format with quality clamped to 100.
    #[inline]
    #[must_use]
    pub fn jpeg(quality: u8) -> Self {
        Self::Jpeg(quality.min(100))
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg(_) => "jpg",
        }
    }

    /// Returns the format string for `Page.startScreencast`.
    #[must_use]
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg(_) => "jpeg",
        }
    }

    /// Returns the JPEG quality, if any.
    #[must_use]
    pub fn quality(&self) -> Option<u8> {
        match self {
            Self::Png => None,
            Self::Jpeg(q) => Some(*q),
        }
    }
}

// ============================================================================
// ScreencastOptions
// ============================================================================

/// Options for starting a screencast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreencastOptions {
    /// Frame image format.
    pub format: ImageFormat,
    /// Maximum frame width.
    pub max_width: Option<u32>,
    /// Maximum frame height.
    pub max_height: Option<u32>,
    /// Capture every n-th frame only.
    pub every_nth_frame: Option<u32>,
    /// Output directory; defaults to a per-capture directory.
    pub output_dir: Option<PathBuf>,
}

impl ScreencastOptions {
    /// Creates PNG options with browser defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image format.
    #[inline]
    #[must_use]
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Limits the frame size.
    #[inline]
    #[must_use]
    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    /// Captures every n-th frame.
    #[inline]
    #[must_use]
    pub fn every_nth_frame(mut self, n: u32) -> Self {
        self.every_nth_frame = Some(n.max(1));
        self
    }

    /// Writes frames to an explicit directory.
    #[inline]
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}
