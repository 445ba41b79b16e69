use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::capture::types::PixelBuffer;

/// Where a tick delivers its finished frame.
pub trait FrameSink: Send + Sync {
    /// Destination size the next frame is scaled to.
    fn surface_size(&self) -> (u32, u32);

    /// Offer a frame tagged with its publish sequence.
    ///
    /// Returns `false` if a frame with an equal or later sequence is already
    /// showing; the offered frame is dropped in that case.
    fn publish(&self, sequence: u64, frame: Arc<PixelBuffer>) -> bool;
}

/// The overlay's drawing target: a size plus the latest published frame.
///
/// Frames are held in an `Arc` so readers (IPC, snapshots) get a cheap
/// pointer instead of copying the pixel buffer.
pub struct DisplaySurface {
    size: Mutex<(u32, u32)>,
    latest: Mutex<Option<Arc<PixelBuffer>>>,
    /// Sequence of the frame in `latest`, zero before the first publish.
    sequence: AtomicU64,
}

impl DisplaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            latest: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    /// Change the destination size. Takes effect from the next tick; the
    /// current frame stays up until then.
    pub fn resize(&self, width: u32, height: u32) {
        let mut size = self.size.lock();
        if *size != (width, height) {
            tracing::debug!("surface resized {}x{} -> {width}x{height}", size.0, size.1);
            *size = (width, height);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    /// The most recently published frame, if any.
    pub fn latest(&self) -> Option<Arc<PixelBuffer>> {
        self.latest.lock().clone()
    }

    /// Sequence number of the frame currently showing.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

impl FrameSink for DisplaySurface {
    fn surface_size(&self) -> (u32, u32) {
        self.size()
    }

    fn publish(&self, sequence: u64, frame: Arc<PixelBuffer>) -> bool {
        let mut latest = self.latest.lock();
        if sequence <= self.sequence.load(Ordering::Acquire) {
            return false;
        }
        *latest = Some(frame);
        self.sequence.store(sequence, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::PixelFormat;

    fn frame(value: u8) -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::new(1, 1, PixelFormat::Rgba, vec![value; 4]).unwrap())
    }

    #[test]
    fn surface_returns_none_when_empty() {
        let surface = DisplaySurface::new(10, 10);
        assert!(surface.latest().is_none());
        assert_eq!(surface.sequence(), 0);
    }

    #[test]
    fn surface_stores_latest_publish() {
        let surface = DisplaySurface::new(10, 10);
        assert!(surface.publish(1, frame(1)));
        assert!(surface.publish(2, frame(2)));
        assert_eq!(surface.latest().unwrap().data[0], 2);
        assert_eq!(surface.sequence(), 2);
    }

    #[test]
    fn surface_rejects_stale_sequence() {
        let surface = DisplaySurface::new(10, 10);
        assert!(surface.publish(5, frame(5)));
        assert!(!surface.publish(4, frame(4)));
        assert!(!surface.publish(5, frame(6)));
        assert_eq!(surface.latest().unwrap().data[0], 5);
        assert_eq!(surface.sequence(), 5);
    }

    #[test]
    fn surface_latest_returns_arc_not_clone() {
        let surface = DisplaySurface::new(10, 10);
        surface.publish(1, frame(42));
        let a = surface.latest().unwrap();
        let b = surface.latest().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn resize_keeps_current_frame() {
        let surface = DisplaySurface::new(10, 10);
        surface.publish(1, frame(7));
        surface.resize(20, 5);
        assert_eq!(surface.surface_size(), (20, 5));
        assert_eq!(surface.latest().unwrap().data[0], 7);
    }

    #[test]
    fn surface_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DisplaySurface>();
    }
}
