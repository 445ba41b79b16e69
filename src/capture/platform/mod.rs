// Platform capture backends.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub use self::windows::Win32Backend;

use crate::capture::error::{CaptureError, Result};

/// Derive the capture size from a window rectangle.
///
/// Minimised windows report collapsed or inverted rectangles; those are a
/// capture failure, not a zero-sized frame.
pub fn capture_size(left: i32, top: i32, right: i32, bottom: i32) -> Result<(u32, u32)> {
    let width = i64::from(right) - i64::from(left);
    let height = i64::from(bottom) - i64::from(top);
    if width <= 0 || height <= 0 {
        return Err(CaptureError::CaptureFailed(format!(
            "degenerate window rectangle {width}x{height}"
        )));
    }
    Ok((width as u32, height as u32))
}
