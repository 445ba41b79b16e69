use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::chroma::{apply_chroma_key, HsvRange};
use super::scale::scale_to_fill;
use super::surface::FrameSink;
use crate::capture::backend::CaptureBackend;
use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{CaptureRequest, PixelBuffer, WindowHandle};

/// How long a tick waits on the capture worker before giving up.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

/// Immutable per-tick view of the overlay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub window_title: String,
    pub hsv: HsvRange,
    pub update_interval_ms: u64,
}

impl PipelineConfig {
    /// Timer period. Zero is clamped to 1 ms.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }
}

/// Why a tick published nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    WindowNotFound,
    CaptureFailed,
    InvalidBuffer,
    /// A previous tick (or its capture) was still running.
    InFlight,
}

impl From<&CaptureError> for SkipReason {
    fn from(err: &CaptureError) -> Self {
        match err {
            CaptureError::WindowNotFound(_) => Self::WindowNotFound,
            CaptureError::Enumeration(_) | CaptureError::CaptureFailed(_) => Self::CaptureFailed,
            CaptureError::InvalidBuffer(_) => Self::InvalidBuffer,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Published {
        sequence: u64,
        frame: Arc<PixelBuffer>,
    },
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn summary(&self) -> TickSummary {
        match self {
            Self::Published { sequence, frame } => TickSummary {
                sequence: Some(*sequence),
                width: frame.width,
                height: frame.height,
                skipped: None,
            },
            Self::Skipped(reason) => TickSummary {
                sequence: None,
                width: 0,
                height: 0,
                skipped: Some(*reason),
            },
        }
    }
}

/// Serialisable form of a [`TickOutcome`] without the pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    pub sequence: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub skipped: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Capturing,
}

/// Holds the in-flight flag for the duration of one tick.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs locate → grab → chroma key → scale → publish, never two at once.
///
/// The platform grab happens on a dedicated worker thread so a hung
/// `PrintWindow` cannot wedge the timer: the tick gives up after
/// `capture_timeout` and later ticks are skipped as `InFlight` until the
/// worker comes back.
pub struct TickDriver {
    backend: Arc<dyn CaptureBackend>,
    worker: CaptureWorker,
    in_flight: AtomicBool,
    next_sequence: AtomicU64,
    capture_timeout: Duration,
}

impl TickDriver {
    pub fn new(backend: Arc<dyn CaptureBackend>, capture_timeout: Duration) -> Self {
        Self {
            worker: CaptureWorker::new(Arc::clone(&backend)),
            backend,
            in_flight: AtomicBool::new(false),
            next_sequence: AtomicU64::new(0),
            capture_timeout,
        }
    }

    pub fn state(&self) -> TickState {
        if self.in_flight.load(Ordering::Acquire) || self.worker.is_busy() {
            TickState::Capturing
        } else {
            TickState::Idle
        }
    }

    /// Run one tick against `config`, publishing into `sink` on success.
    ///
    /// Never panics across this boundary for capture-side failures; every
    /// failure becomes `TickOutcome::Skipped`.
    pub fn tick(&self, config: &PipelineConfig, sink: &dyn FrameSink) -> TickOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            debug!("tick dropped: previous tick still running");
            return TickOutcome::Skipped(SkipReason::InFlight);
        };
        if self.worker.is_busy() {
            debug!("tick dropped: capture worker still busy with an abandoned grab");
            return TickOutcome::Skipped(SkipReason::InFlight);
        }

        let request = CaptureRequest::new(config.window_title.clone());
        let frame = match self.run_pipeline(&request, &config.hsv, sink) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                log_failure(&e);
                return TickOutcome::Skipped(SkipReason::from(&e));
            }
        };

        // Sequence is taken under the guard, so publishes stay in tick order.
        let sequence = self.next_sequence.fetch_add(1, Ordering::AcqRel) + 1;
        if sink.publish(sequence, Arc::clone(&frame)) {
            TickOutcome::Published { sequence, frame }
        } else {
            warn!("frame {sequence} rejected by sink: a newer frame is already showing");
            TickOutcome::Skipped(SkipReason::InFlight)
        }
    }

    fn run_pipeline(
        &self,
        request: &CaptureRequest,
        hsv: &HsvRange,
        sink: &dyn FrameSink,
    ) -> Result<PixelBuffer> {
        let handle = self.backend.locate(&request.window_title)?;
        let raw = self.grab_with_timeout(handle)?;
        let keyed = apply_chroma_key(&raw, hsv)?;
        let (width, height) = sink.surface_size();
        scale_to_fill(keyed, width, height)
    }

    fn grab_with_timeout(&self, handle: WindowHandle) -> Result<PixelBuffer> {
        let reply = self.worker.submit(handle)?;
        match reply.recv_timeout(self.capture_timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(CaptureError::CaptureFailed(format!(
                "capture of {handle} timed out after {}ms",
                self.capture_timeout.as_millis()
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CaptureError::CaptureFailed(
                "capture worker exited mid-grab".to_string(),
            )),
        }
    }
}

fn log_failure(err: &CaptureError) {
    match err {
        CaptureError::WindowNotFound(_) => debug!("tick skipped: {err}"),
        CaptureError::Enumeration(_) | CaptureError::CaptureFailed(_) => {
            warn!("tick skipped: {err}")
        }
        CaptureError::InvalidBuffer(_) => error!("tick skipped: {err}"),
    }
}

// --- Capture worker ---

struct CaptureJob {
    handle: WindowHandle,
    reply: mpsc::SyncSender<Result<PixelBuffer>>,
}

/// Persistent thread that performs the platform grab.
///
/// Spawned lazily and respawned if it ever dies, so a failure to start it
/// surfaces as a `CaptureFailed` tick rather than a panic.
struct CaptureWorker {
    backend: Arc<dyn CaptureBackend>,
    jobs: Mutex<Option<mpsc::Sender<CaptureJob>>>,
    busy: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the worker's busy flag when a grab ends, including by unwinding.
struct BusyReset<'a>(&'a AtomicBool);

impl Drop for BusyReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CaptureWorker {
    fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            jobs: Mutex::new(None),
            busy: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn submit(&self, handle: WindowHandle) -> Result<mpsc::Receiver<Result<PixelBuffer>>> {
        let (reply, receiver) = mpsc::sync_channel(1);
        let job = CaptureJob { handle, reply };

        self.busy.store(true, Ordering::Release);
        let mut jobs = self.jobs.lock();
        let job = match jobs.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return Ok(receiver),
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };

        // No worker yet, or the previous one is gone.
        let sender = match self.spawn() {
            Ok(sender) => sender,
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                return Err(e);
            }
        };
        if sender.send(job).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(CaptureError::CaptureFailed(
                "capture worker exited on startup".to_string(),
            ));
        }
        *jobs = Some(sender);
        Ok(receiver)
    }

    fn spawn(&self) -> Result<mpsc::Sender<CaptureJob>> {
        let (sender, receiver) = mpsc::channel::<CaptureJob>();
        let backend = Arc::clone(&self.backend);
        let busy = Arc::clone(&self.busy);

        let handle = std::thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || {
                debug!("capture worker starting");
                for job in receiver {
                    let result = {
                        let _reset = BusyReset(&busy);
                        backend.grab(job.handle)
                    };
                    // The tick may have timed out and dropped its receiver.
                    let _ = job.reply.send(result);
                }
                debug!("capture worker exiting");
            })
            .map_err(|e| CaptureError::CaptureFailed(format!("failed to spawn capture worker: {e}")))?;

        if let Some(previous) = self.thread.lock().replace(handle) {
            let _ = previous.join();
        }
        Ok(sender)
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.jobs.lock().take();
        if let Some(handle) = self.thread.lock().take() {
            // A grab stuck in the platform call cannot be interrupted; leave
            // that thread detached rather than hang shutdown.
            if !self.is_busy() {
                let _ = handle.join();
            }
        }
    }
}
