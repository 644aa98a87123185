//! Dual-clock timestamp synthesis.
//!
//! Wall-clock time is queried exactly once, at acquisition start, together
//! with a monotonic instant. Every later timestamp is the captured base
//! plus a monotonic elapsed offset, so absolute timestamps can never drift
//! against the relative times used for ordering, and synthesizing a
//! timestamp is deterministic given the same base/offset pair.

use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};

/// Timestamp format with microsecond resolution.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Clock base captured at acquisition start.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionClock {
    base: DateTime<Utc>,
    start: Instant,
}

impl AcquisitionClock {
    /// Capture the wall-clock base and the monotonic start instant, as
    /// close together as the platform allows.
    pub fn start_now() -> Self {
        Self {
            base: Utc::now(),
            start: Instant::now(),
        }
    }

    /// Clock with an explicit wall-clock base. The monotonic start is still
    /// captured now; used by tests that need reproducible timestamps.
    pub fn with_base(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }

    /// Wall-clock instant captured at start.
    pub fn base(&self) -> DateTime<Utc> {
        self.base
    }

    /// Monotonic seconds since acquisition start.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Absolute instant for a given elapsed offset.
    pub fn absolute(&self, elapsed: f64) -> DateTime<Utc> {
        let micros = (elapsed * 1e6).round() as i64;
        self.base + TimeDelta::microseconds(micros)
    }

    /// Format `base + elapsed` with microsecond resolution.
    pub fn format_timestamp(&self, elapsed: f64) -> String {
        self.absolute(elapsed).format(TIMESTAMP_FORMAT).to_string()
    }
}
