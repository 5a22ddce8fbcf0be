//! Lightweight timing for header I/O.
//!
//! Discovery and metadata extraction are the only places this layer touches
//! the filesystem, so those are the only things measured. Disabled unless
//! enabled programmatically or `DD_TIMING` is set.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("DD_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and add the elapsed time to `acc` when enabled.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(elapsed) = self.stop() {
            acc.record(elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Process-wide header I/O timers.
pub mod header_timing {
    use super::AccumulatingTimer;

    /// Directory walks performed by discovery.
    pub static DISCOVERY: AccumulatingTimer = AccumulatingTimer::new();
    /// Attribute reads performed by metadata extraction.
    pub static EXTRACT_CALLS: AccumulatingTimer = AccumulatingTimer::new();

    /// Snapshot of the header timers.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Summary {
        pub discovery_calls: u64,
        pub discovery_total_s: f64,
        pub extract_calls: u64,
        pub extract_total_s: f64,
        pub extract_avg_s: f64,
    }

    pub fn summary() -> Summary {
        Summary {
            discovery_calls: DISCOVERY.count(),
            discovery_total_s: DISCOVERY.total_seconds(),
            extract_calls: EXTRACT_CALLS.count(),
            extract_total_s: EXTRACT_CALLS.total_seconds(),
            extract_avg_s: EXTRACT_CALLS.average_seconds(),
        }
    }

    pub fn reset_all() {
        DISCOVERY.reset();
        EXTRACT_CALLS.reset();
    }
}
