use std::sync::atomic::{AtomicU32, Ordering};

use crate::capture::backend::{FrameGrabber, WindowLocator};
use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{PixelBuffer, PixelFormat, WindowHandle, WindowInfo};

pub const DUMMY_WINDOW_TITLE: &str = "Dummy Chroma Window";
const DUMMY_WINDOW_HANDLE: isize = 0xD0D0;

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 180;
const SQUARE_SIZE: u32 = 48;

/// BGRA green screen, HSV (60, 255, 255), inside the default key range.
const BACKGROUND_BGRA: [u8; 4] = [0, 255, 0, 255];
/// BGRA magenta, far outside any green key range.
const SQUARE_BGRA: [u8; 4] = [255, 0, 255, 255];

/// A simulated target window for running the pipeline without a real one.
///
/// Renders a green-screen background with a magenta square that moves one
/// step per grab, so the overlay visibly updates.
///
/// Enable via `DUMMY_WINDOW=1` environment variable.
pub struct DummyBackend {
    frame_counter: AtomicU32,
}

impl DummyBackend {
    pub fn new() -> Self {
        Self {
            frame_counter: AtomicU32::new(0),
        }
    }

    /// Whether the dummy window is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_WINDOW").is_ok_and(|v| v == "1" || v == "true")
    }

    /// The stable handle of the dummy window.
    pub fn handle() -> WindowHandle {
        WindowHandle::from_raw(DUMMY_WINDOW_HANDLE)
    }

    /// Render the test pattern with the square at horizontal step `frame`.
    pub fn test_frame(frame: u32) -> PixelBuffer {
        let travel = FRAME_WIDTH - SQUARE_SIZE;
        let square_x = (frame * 4) % travel;
        let square_y = (FRAME_HEIGHT - SQUARE_SIZE) / 2;

        let mut data = Vec::with_capacity((FRAME_WIDTH * FRAME_HEIGHT * 4) as usize);
        for y in 0..FRAME_HEIGHT {
            for x in 0..FRAME_WIDTH {
                let inside = (square_x..square_x + SQUARE_SIZE).contains(&x)
                    && (square_y..square_y + SQUARE_SIZE).contains(&y);
                data.extend_from_slice(if inside {
                    &SQUARE_BGRA
                } else {
                    &BACKGROUND_BGRA
                });
            }
        }

        PixelBuffer {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            format: PixelFormat::Bgra,
            data,
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowLocator for DummyBackend {
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(vec![WindowInfo {
            handle: Self::handle(),
            title: DUMMY_WINDOW_TITLE.to_string(),
            is_visible: true,
        }])
    }
}

impl FrameGrabber for DummyBackend {
    fn grab(&self, handle: WindowHandle) -> Result<PixelBuffer> {
        if handle != Self::handle() {
            return Err(CaptureError::CaptureFailed(format!(
                "no dummy window behind handle {handle}"
            )));
        }
        let frame = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Self::test_frame(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_backend_enumerates_one_window() {
        let backend = DummyBackend::new();
        let windows = backend.enumerate_windows().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].title, "Dummy Chroma Window");
        assert_eq!(windows[0].handle, DummyBackend::handle());
        assert!(windows[0].is_visible);
    }

    #[test]
    fn dummy_backend_locates_by_exact_title() {
        let backend = DummyBackend::new();
        assert_eq!(
            backend.locate(DUMMY_WINDOW_TITLE).unwrap(),
            DummyBackend::handle()
        );
        assert!(backend.locate("Dummy").is_err());
    }

    #[test]
    fn dummy_backend_grab_returns_valid_bgra() {
        let backend = DummyBackend::new();
        let frame = backend.grab(DummyBackend::handle()).unwrap();
        assert_eq!(frame.format, PixelFormat::Bgra);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 180);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn dummy_backend_grab_rejects_foreign_handle() {
        let backend = DummyBackend::new();
        let result = backend.grab(WindowHandle::from_raw(1));
        assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
    }

    #[test]
    fn test_frame_square_moves_between_frames() {
        let a = DummyBackend::test_frame(0);
        let b = DummyBackend::test_frame(1);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_frame_corner_is_green_screen() {
        let frame = DummyBackend::test_frame(0);
        assert_eq!(&frame.data[..4], &BACKGROUND_BGRA);
    }

    #[test]
    fn dummy_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DummyBackend>();
    }
}
