use serde::Serialize;
use std::time::{Duration, Instant};

use crate::pipeline::tick::{SkipReason, TickOutcome};

/// Collects diagnostic statistics for an overlay session.
pub struct DiagnosticStats {
    published_count: u64,
    total_bytes: u64,
    skipped: SkipCounts,
    window_missing_streak: u32,
    start_time: Instant,
    last_tick: Option<Duration>,
}

/// Skipped ticks, per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    pub window_not_found: u64,
    pub capture_failed: u64,
    pub invalid_buffer: u64,
    pub in_flight: u64,
}

impl SkipCounts {
    fn total(&self) -> u64 {
        self.window_not_found + self.capture_failed + self.invalid_buffer + self.in_flight
    }

    fn bump(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::WindowNotFound => self.window_not_found += 1,
            SkipReason::CaptureFailed => self.capture_failed += 1,
            SkipReason::InvalidBuffer => self.invalid_buffer += 1,
            SkipReason::InFlight => self.in_flight += 1,
        }
    }
}

/// Snapshot of diagnostic stats for IPC serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub published_count: u64,
    pub skipped: SkipCounts,
    pub skip_rate: f64,
    pub window_missing_streak: u32,
    pub last_tick_ms: Option<f64>,
    pub bandwidth_bps: u64,
    /// Sequence of the frame currently on the surface.
    pub last_sequence: u64,
    /// Whether a tick or an abandoned grab is still running.
    pub capturing: bool,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            published_count: 0,
            total_bytes: 0,
            skipped: SkipCounts::default(),
            window_missing_streak: 0,
            start_time: Instant::now(),
            last_tick: None,
        }
    }

    /// Record one tick and how long its pipeline ran.
    ///
    /// Returns the number of consecutive `WindowNotFound` skips so far. An
    /// `InFlight` skip never ran the pipeline and leaves the streak untouched.
    pub fn record(&mut self, outcome: &TickOutcome, elapsed: Duration) -> u32 {
        match outcome {
            TickOutcome::Published { frame, .. } => {
                self.published_count += 1;
                self.total_bytes += frame.data.len() as u64;
                self.window_missing_streak = 0;
                self.last_tick = Some(elapsed);
            }
            TickOutcome::Skipped(reason) => {
                self.skipped.bump(*reason);
                match reason {
                    SkipReason::WindowNotFound => self.window_missing_streak += 1,
                    SkipReason::InFlight => return self.window_missing_streak,
                    _ => self.window_missing_streak = 0,
                }
                self.last_tick = Some(elapsed);
            }
        }
        self.window_missing_streak
    }

    /// Published frames per second since the stats were (re)started.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.published_count as f64 / elapsed
    }

    /// Skip rate as a percentage (0.0 - 100.0).
    pub fn skip_rate(&self) -> f64 {
        let skipped = self.skipped.total();
        let total = self.published_count + skipped;
        if total == 0 {
            return 0.0;
        }
        (skipped as f64 / total as f64) * 100.0
    }

    /// Published bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Take a serialisable snapshot. The session fills in the surface and
    /// driver fields.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            published_count: self.published_count,
            skipped: self.skipped,
            skip_rate: self.skip_rate(),
            window_missing_streak: self.window_missing_streak,
            last_tick_ms: self.last_tick.map(|d| d.as_secs_f64() * 1000.0),
            bandwidth_bps: self.bandwidth_bps(),
            last_sequence: 0,
            capturing: false,
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}
