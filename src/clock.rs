//! Time sources for countdowns.
//!
//! A countdown only ever needs one question answered: "what time is it now,
//! in milliseconds since the UNIX epoch?" The [`Clock`] trait captures that,
//! so the controller can run against the wall clock in production and against
//! a [`ManualClock`] in tests or in hosts that drive their own notion of time.
//!
//! # Examples
//!
//! ```rust
//! use countdown_chronometer::clock::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(10_000);
//! assert_eq!(clock.now_millis(), 10_000);
//!
//! clock.advance(Duration::from_millis(1500));
//! assert_eq!(clock.now_millis(), 11_500);
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Supplies the current instant as milliseconds since the UNIX epoch.
///
/// Implementations must be cheap to call; the controller asks for the time on
/// every tick and on every state change.
pub trait Clock: Send + Sync {
    /// Returns the current instant in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time backed by [`SystemTime`].
///
/// Instants before the epoch are reported as negative values rather than
/// failing, so a badly set system clock degrades instead of panicking.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|ms| -ms)
                .unwrap_or(i64::MIN),
        }
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hand one clone to a
/// controller and keep another to advance time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a manual clock frozen at `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_millis)),
        }
    }

    /// Moves the clock forward by `by`, saturating at `i64::MAX`.
    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let mut current = self.now.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(millis);
            match self
                .now
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sets the clock to an absolute instant. Moving backwards is allowed.
    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_frozen() {
        let clock = ManualClock::new(42);
        assert_eq!(clock.now_millis(), 42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let observer = clock.clone();

        clock.advance(Duration::from_secs(3));
        assert_eq!(observer.now_millis(), 3000);

        observer.set(-500);
        assert_eq!(clock.now_millis(), -500);
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new(i64::MAX - 10);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), i64::MAX);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock::new().now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_arc_clock_delegates() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(7));
        assert_eq!(clock.now_millis(), 7);
    }
}
