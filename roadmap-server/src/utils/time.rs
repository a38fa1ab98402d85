//! Wall-clock timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in microseconds since the Unix epoch.
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Convert seconds to microseconds, clamping negatives to zero.
pub fn secs_to_us(secs: f64) -> u64 {
    if secs <= 0.0 {
        0
    } else {
        (secs * 1_000_000.0).round() as u64
    }
}
