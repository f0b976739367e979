//! Rate limiter for noisy audio engine diagnostics.
//!
//! Engines tend to repeat the same underflow / decode warning many times a
//! second.  A report is forwarded to the log only when its code differs from
//! the last one emitted for the same source, or when at least
//! [`REPEAT_INTERVAL_MS`] have passed since that source last emitted.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;

/// Minimum spacing between two emissions of the same code from one source.
pub const REPEAT_INTERVAL_MS: u64 = 1000;

/// Receiver of asynchronous engine status reports.
pub trait StatusSink {
    fn report(&mut self, source: &str, code: i32, message: &str);
}

#[derive(Debug, Clone, Copy)]
struct ThrottleEntry {
    last_code: i32,
    last_emit_ms: u64,
}

pub struct StatusThrottle {
    clock: Arc<dyn Clock>,
    entries: HashMap<String, ThrottleEntry>,
}

impl StatusThrottle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: HashMap::new(),
        }
    }

    /// Returns `true` if the event was emitted, `false` if it was dropped.
    pub fn submit(&mut self, source: &str, code: i32, message: &str) -> bool {
        let now = self.clock.now_ms();

        if let Some(entry) = self.entries.get(source) {
            let elapsed = now.saturating_sub(entry.last_emit_ms);
            if entry.last_code == code && elapsed < REPEAT_INTERVAL_MS {
                return false;
            }
        }

        warn!(source, code, "engine status: {}", message);
        self.entries.insert(
            source.to_string(),
            ThrottleEntry {
                last_code: code,
                last_emit_ms: now,
            },
        );
        true
    }
}

impl StatusSink for StatusThrottle {
    fn report(&mut self, source: &str, code: i32, message: &str) {
        self.submit(source, code, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn throttle() -> (StatusThrottle, ManualClock) {
        let clock = ManualClock::new(5_000);
        (StatusThrottle::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_same_code_within_interval_emits_once() {
        let (mut t, clock) = throttle();
        assert!(t.submit("buffer", 2, "underflow"));
        clock.advance(999);
        assert!(!t.submit("buffer", 2, "underflow"));
    }

    #[test]
    fn test_same_code_after_interval_emits_again() {
        let (mut t, clock) = throttle();
        assert!(t.submit("mp3", 7, "decode hiccup"));
        clock.advance(1001);
        assert!(t.submit("mp3", 7, "decode hiccup"));
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let (mut t, clock) = throttle();
        assert!(t.submit("mp3", 7, "x"));
        clock.advance(1000);
        assert!(t.submit("mp3", 7, "x"));
    }

    #[test]
    fn test_code_change_bypasses_interval() {
        let (mut t, clock) = throttle();
        assert!(t.submit("buffer", 1, "a"));
        clock.advance(10);
        assert!(t.submit("buffer", 2, "b"));
        clock.advance(10);
        assert!(t.submit("buffer", 1, "a"));
    }

    #[test]
    fn test_sources_are_tracked_independently() {
        let (mut t, clock) = throttle();
        assert!(t.submit("buffer", 3, "a"));
        assert!(t.submit("mp3", 3, "a"));
        clock.advance(100);
        assert!(!t.submit("buffer", 3, "a"));
        assert!(!t.submit("mp3", 3, "a"));
    }

    #[test]
    fn test_dropped_report_does_not_restart_window() {
        let (mut t, clock) = throttle();
        assert!(t.submit("buffer", 4, "a"));
        clock.advance(600);
        assert!(!t.submit("buffer", 4, "a"));
        clock.advance(400);
        assert!(t.submit("buffer", 4, "a"));
    }
}
