use serde::Serialize;
use std::fmt;

use crate::capture::error::{CaptureError, Result};

/// Opaque platform window handle.
///
/// Stored as an integer so it can cross threads; the platform backend turns
/// it back into a native handle. A handle is only meaningful for the tick
/// that resolved it; windows can close and reopen between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WindowHandle(isize);

impl WindowHandle {
    /// Wrap a raw platform handle value.
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    /// Return the raw platform handle value.
    pub fn as_raw(self) -> isize {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A top-level window as reported by the platform enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub is_visible: bool,
}

/// Per-tick capture request. Built fresh from the config snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub window_title: String,
}

impl CaptureRequest {
    pub fn new(window_title: impl Into<String>) -> Self {
        Self {
            window_title: window_title.into(),
        }
    }
}

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    Bgr,
    Bgra,
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Bgr => 3,
            Self::Bgra | Self::Rgba => 4,
        }
    }
}

/// A tightly packed, top-down pixel buffer.
///
/// `data.len()` always equals `width * height * format.channels()` for
/// buffers built through [`PixelBuffer::new`]. Buffers move between
/// pipeline stages by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer, rejecting data whose length does not match the
    /// dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let buffer = Self {
            width,
            height,
            format,
            data,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    /// A zero-sized buffer.
    pub fn empty(format: PixelFormat) -> Self {
        Self {
            width: 0,
            height: 0,
            format,
            data: Vec::new(),
        }
    }

    /// Expected byte length for the buffer's dimensions and format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check the length invariant.
    pub fn validate(&self) -> Result<()> {
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(CaptureError::InvalidBuffer(format!(
                "{}x{} {:?} needs {expected} bytes, got {}",
                self.width,
                self.height,
                self.format,
                self.data.len()
            )));
        }
        Ok(())
    }
}
