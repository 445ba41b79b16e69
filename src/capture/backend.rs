use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{PixelBuffer, WindowHandle, WindowInfo};

/// Resolves window titles to platform handles.
///
/// Implemented per-platform (Win32 `EnumWindows` on Windows) and by the
/// dummy source. Lookups are never cached: every call re-enumerates.
pub trait WindowLocator: Send + Sync {
    /// Enumerate all current top-level windows, visible or not.
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Find the window whose title equals `title` exactly.
    fn locate(&self, title: &str) -> Result<WindowHandle> {
        find_exact(&self.enumerate_windows()?, title)
    }
}

/// Produces one bitmap of a window's current content.
pub trait FrameGrabber: Send + Sync {
    /// Capture the window behind `handle`, occluded or not.
    ///
    /// Returns `CaptureFailed` for degenerate geometry or when the platform
    /// refuses to render the window.
    fn grab(&self, handle: WindowHandle) -> Result<PixelBuffer>;
}

/// A complete capture source: lookup plus grab.
pub trait CaptureBackend: WindowLocator + FrameGrabber {}

impl<T: WindowLocator + FrameGrabber> CaptureBackend for T {}

/// Exact, case-sensitive title match. The first match in enumeration order
/// wins. An empty title never matches.
pub fn find_exact(windows: &[WindowInfo], title: &str) -> Result<WindowHandle> {
    if title.is_empty() {
        return Err(CaptureError::WindowNotFound(String::new()));
    }
    windows
        .iter()
        .find(|w| w.title == title)
        .map(|w| w.handle)
        .ok_or_else(|| CaptureError::WindowNotFound(title.to_string()))
}
