//! Timing configuration for the session lifecycle
//!
//! The delays are fixed by design (not per-call parameters); grouping
//! them in one struct keeps them named and lets tests shrink them.

use std::time::Duration;

/// Fixed delays driving the playback loop and the idle-channel watchdog
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Gap between one clip finishing and the next cycle starting.
    /// The audio pipeline needs a brief pause before re-triggering.
    pub cycle_gap: Duration,
    /// Grace delay between cycle exhaustion and teardown, so a rapid
    /// re-start can cancel the pending stop and reuse the session.
    pub stop_grace: Duration,
    /// Period of the idle-channel membership check.
    pub empty_check_period: Duration,
    /// Debounce between observing an empty channel and acting on it.
    /// Absorbs reconnect blips; membership is re-read at expiry.
    pub empty_debounce: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            cycle_gap: Duration::from_millis(100),
            stop_grace: Duration::from_secs(5),
            empty_check_period: Duration::from_secs(1),
            empty_debounce: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = SessionTiming::default();
        assert_eq!(timing.cycle_gap, Duration::from_millis(100));
        assert_eq!(timing.stop_grace, Duration::from_secs(5));
        assert_eq!(timing.empty_check_period, Duration::from_secs(1));
        assert_eq!(timing.empty_debounce, Duration::from_secs(5));
    }
}
