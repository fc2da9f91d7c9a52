//! Common time/period helpers for softplc_core.

use std::time::Duration;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Divide `period` by the plant timescale.
/// - Clamps `timescale` to at least 1 to avoid division by zero.
/// - Ensures the result is at least 1 millisecond.
#[inline]
pub fn scaled_period(period: Duration, timescale: u16) -> Duration {
    (period / u32::from(timescale.max(1))).max(Duration::from_millis(1))
}

/// Divide a timeout by the plant timescale, clamping `timescale` to at least 1.
#[inline]
pub fn scaled_timeout(timeout: Duration, timescale: u16) -> Duration {
    timeout / u32::from(timescale.max(1))
}

/// Compute the cycle frequency in Hz for a period, for logging.
#[inline]
pub fn rate_hz(period: Duration) -> f64 {
    let ms = period.as_millis().max(1) as f64;
    MILLIS_PER_SEC as f64 / ms
}
