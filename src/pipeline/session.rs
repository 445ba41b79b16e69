use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::surface::DisplaySurface;
use super::tick::{PipelineConfig, TickDriver, TickOutcome, TickState, DEFAULT_CAPTURE_TIMEOUT};
use crate::capture::backend::CaptureBackend;
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};

/// Consecutive `WindowNotFound` ticks before the UI is told the target is gone.
pub const WINDOW_MISSING_THRESHOLD: u32 = 25;

/// Callback invoked after every tick, timer-driven or manual.
/// Arguments: (outcome, consecutive WindowNotFound skips).
///
/// Published outcomes reach the callback in sequence order; a publish that
/// finishes after a newer one has already been reported is not reported.
pub type TickCallback = Arc<dyn Fn(&TickOutcome, u32) + Send + Sync>;

/// Payload emitted via the `overlay-frame` Tauri event after a publish.
#[derive(Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
}

/// Payload emitted via the `overlay-window-missing` Tauri event.
#[derive(Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMissingPayload {
    pub window_title: String,
    pub consecutive_misses: u32,
}

/// Whether this streak value is the one that should raise the warning.
/// Fires once per outage, not on every tick after the threshold.
pub fn crossed_missing_threshold(streak: u32) -> bool {
    streak == WINDOW_MISSING_THRESHOLD
}

/// State shared between the session handle and its timer thread.
struct Shared {
    driver: TickDriver,
    surface: Arc<DisplaySurface>,
    config: Mutex<PipelineConfig>,
    stats: Mutex<DiagnosticStats>,
    on_tick: Option<TickCallback>,
    shutdown: AtomicBool,
    /// Set by `update_config` so the timer restarts its schedule.
    rearm: AtomicBool,
    /// Highest sequence handed to `on_tick`. Held while the callback runs.
    notified: Mutex<u64>,
}

impl Shared {
    fn run_tick(&self) -> TickOutcome {
        let snapshot = self.config.lock().clone();
        let started = Instant::now();
        let outcome = self.driver.tick(&snapshot, self.surface.as_ref());
        let streak = self.stats.lock().record(&outcome, started.elapsed());
        self.notify(&outcome, streak);
        outcome
    }

    fn notify(&self, outcome: &TickOutcome, streak: u32) {
        let Some(cb) = &self.on_tick else {
            return;
        };
        let mut notified = self.notified.lock();
        if let TickOutcome::Published { sequence, .. } = outcome {
            if *sequence <= *notified {
                debug!("frame {sequence} not reported: {} already was", *notified);
                return;
            }
            *notified = *sequence;
        }
        cb(outcome, streak);
    }
}

/// A running overlay: one timer thread ticking the pipeline at the
/// configured interval.
pub struct OverlaySession {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl OverlaySession {
    /// Start ticking immediately with `config`, publishing into `surface`.
    pub fn start(
        backend: Arc<dyn CaptureBackend>,
        surface: Arc<DisplaySurface>,
        config: PipelineConfig,
        on_tick: Option<TickCallback>,
    ) -> std::io::Result<Self> {
        Self::start_with_timeout(backend, surface, config, on_tick, DEFAULT_CAPTURE_TIMEOUT)
    }

    pub fn start_with_timeout(
        backend: Arc<dyn CaptureBackend>,
        surface: Arc<DisplaySurface>,
        config: PipelineConfig,
        on_tick: Option<TickCallback>,
        capture_timeout: Duration,
    ) -> std::io::Result<Self> {
        info!(
            "overlay session starting for {:?} every {}ms",
            config.window_title, config.update_interval_ms
        );
        let shared = Arc::new(Shared {
            driver: TickDriver::new(backend, capture_timeout),
            surface,
            config: Mutex::new(config),
            stats: Mutex::new(DiagnosticStats::new()),
            on_tick,
            shutdown: AtomicBool::new(false),
            rearm: AtomicBool::new(false),
            notified: Mutex::new(0),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("overlay-timer".to_string())
                .spawn(move || Self::run_timer(&shared))?
        };

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Fixed-rate schedule. A tick that overruns its slot is not made up:
    /// missed slots are coalesced into one and the schedule restarts from now.
    fn run_timer(shared: &Shared) {
        let mut next = Instant::now();
        while !shared.shutdown.load(Ordering::Acquire) {
            if shared.rearm.swap(false, Ordering::AcqRel) {
                next = Instant::now();
            }
            let now = Instant::now();
            if now < next {
                std::thread::park_timeout(next - now);
                continue;
            }

            shared.run_tick();

            let interval = shared.config.lock().interval();
            next += interval;
            let now = Instant::now();
            if next <= now {
                next = now + interval;
            }
        }
        debug!("overlay timer exiting");
    }

    /// Swap in a new config. Applied from the next tick, which fires
    /// straight away.
    pub fn update_config(&self, config: PipelineConfig) {
        info!(
            "overlay config updated: {:?} every {}ms",
            config.window_title, config.update_interval_ms
        );
        *self.shared.config.lock() = config;
        self.shared.rearm.store(true, Ordering::Release);
        self.unpark();
    }

    pub fn config(&self) -> PipelineConfig {
        self.shared.config.lock().clone()
    }

    /// Run a tick on the caller's thread. Obeys the same non-overlap rule
    /// as the timer, so it may come back `Skipped(InFlight)`.
    pub fn tick_now(&self) -> TickOutcome {
        self.shared.run_tick()
    }

    /// Take a snapshot of diagnostic stats for this session.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        let mut snapshot = self.shared.stats.lock().snapshot();
        snapshot.last_sequence = self.shared.surface.sequence();
        snapshot.capturing = self.shared.driver.state() == TickState::Capturing;
        snapshot
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some() && !self.shared.shutdown.load(Ordering::Acquire)
    }

    fn unpark(&self) {
        if let Some(handle) = self.thread.lock().as_ref() {
            handle.thread().unpark();
        }
    }

    /// Stop the timer. Idempotent; calling stop twice does not panic.
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.stop();
    }
}
