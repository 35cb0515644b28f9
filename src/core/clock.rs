//! Wall-clock time in milliseconds.
//!
//! Timed effects compare stored start times against "now" lazily, so every
//! game function takes `now` as an argument instead of reading the clock.
//! Only the loop coordinator calls [`now_millis`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Current wall-clock time.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as Millis
}

/// Seconds elapsed between two samples, zero if the clock went backwards.
#[inline]
pub fn elapsed_secs(since: Millis, now: Millis) -> f32 {
    now.saturating_sub(since) as f32 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_secs() {
        assert_eq!(elapsed_secs(1_000, 3_500), 2.5);
        assert_eq!(elapsed_secs(3_500, 1_000), 0.0);
    }
}
