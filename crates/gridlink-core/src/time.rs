//! Time utilities for GridLink
//!
//! Timestamp helpers used for heartbeat bookkeeping.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// # Panics
///
/// Panics if the system time is before the Unix epoch (1970-01-01),
/// which would indicate a severely misconfigured system clock.
///
/// # Examples
///
/// ```
/// use gridlink_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_millis() as u64
}

/// Calculate elapsed time in milliseconds since a given timestamp.
///
/// Returns 0 if the given timestamp is in the future.
pub fn elapsed_millis(since: u64) -> u64 {
    current_time_millis().saturating_sub(since)
}
