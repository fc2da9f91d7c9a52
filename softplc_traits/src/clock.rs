use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock shared by the bridge task and the control loop.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - pace(): best-effort periodic pacing, see below
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis().min(u128::from(u64::MAX)) as u64
    }

    /// Seconds elapsed since `epoch` as a float, for engineering-unit timestamps.
    fn secs_since(&self, epoch: Instant) -> f64 {
        self.now().saturating_duration_since(epoch).as_secs_f64()
    }

    /// Sleep for whatever is left of `period` since `started` and return the
    /// time actually slept. An overrun sleeps zero; the debt is not carried
    /// into the next period.
    fn pace(&self, started: Instant, period: Duration) -> Duration {
        let elapsed = self.now().saturating_duration_since(started);
        let remaining = period.saturating_sub(elapsed);
        self.sleep(remaining);
        remaining
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic test clock whose time can be advanced manually.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    /// Clones share the same timeline, so a clone handed to a task can be
    /// advanced from the test body.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Total virtual time elapsed since construction.
        pub fn elapsed(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::TestClock;
    use super::*;

    #[test]
    fn pace_sleeps_the_remainder_of_the_period() {
        let clock = TestClock::new();
        let started = clock.now();
        clock.advance(Duration::from_millis(3));
        let slept = clock.pace(started, Duration::from_millis(10));
        assert_eq!(slept, Duration::from_millis(7));
        assert_eq!(clock.ms_since(started), 10);
    }

    #[test]
    fn pace_never_accumulates_debt_on_overrun() {
        let clock = TestClock::new();
        let started = clock.now();
        clock.advance(Duration::from_millis(25));
        let slept = clock.pace(started, Duration::from_millis(10));
        assert_eq!(slept, Duration::ZERO);
        assert_eq!(clock.ms_since(started), 25);
    }

    #[test]
    fn secs_since_reports_fractional_seconds() {
        let clock = TestClock::new();
        let epoch = clock.now();
        clock.advance(Duration::from_millis(1500));
        assert!((clock.secs_since(epoch) - 1.5).abs() < 1e-9);
    }
}
