use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{Callback, Scheduler, TaskHandle};
use crate::clock::{Clock, ManualClock};

/// A scheduler whose time only moves when [`advance`](Self::advance) is called.
///
/// Callbacks are kept in deadline order. Advancing fires every callback that
/// falls due inside the window, one at a time and with the clock set to the
/// callback's own deadline, so a callback that re-arms itself for a deadline
/// still inside the window fires again during the same advance.
///
/// # Examples
///
/// ```rust
/// use countdown_chronometer::clock::ManualClock;
/// use countdown_chronometer::scheduler::{ManualScheduler, Scheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new(ManualClock::new(0));
/// let fired = Arc::new(AtomicUsize::new(0));
///
/// let counter = fired.clone();
/// scheduler.schedule_after(Duration::from_secs(1), Box::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// scheduler.advance(Duration::from_millis(999));
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
/// scheduler.advance(Duration::from_millis(1));
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    queue: BTreeMap<(i64, TaskHandle), Callback>,
    deadlines: HashMap<TaskHandle, i64>,
}

impl ManualScheduler {
    /// Creates a scheduler that reads and advances `clock`.
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    /// The clock this scheduler drives.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of callbacks waiting to fire.
    pub fn pending(&self) -> usize {
        self.with_state(|state| state.queue.len())
    }

    /// Deadline of the next callback, in milliseconds since the epoch.
    pub fn next_deadline(&self) -> Option<i64> {
        self.with_state(|state| state.queue.keys().next().map(|(deadline, _)| *deadline))
    }

    /// Moves time forward by `by`, firing due callbacks. Returns how many fired.
    pub fn advance(&self, by: Duration) -> usize {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.advance_to(self.clock.now_millis().saturating_add(millis))
    }

    /// Moves time forward to `target` (milliseconds since the epoch), firing
    /// due callbacks. Returns how many fired.
    pub fn advance_to(&self, target: i64) -> usize {
        let mut fired = 0;
        loop {
            let due = self.with_state(|state| {
                let (&(deadline, handle), _) = state.queue.iter().next()?;
                if deadline > target {
                    return None;
                }
                state.deadlines.remove(&handle);
                state
                    .queue
                    .remove(&(deadline, handle))
                    .map(|callback| (deadline, callback))
            });

            let Some((deadline, callback)) = due else {
                break;
            };

            if deadline > self.clock.now_millis() {
                self.clock.set(deadline);
            }
            // The lock is released here, so the callback may schedule or cancel.
            callback();
            fired += 1;
        }

        if target > self.clock.now_millis() {
            self.clock.set(target);
        }
        fired
    }

    fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ManualState) -> R,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let deadline = self.clock.now_millis().saturating_add(millis);
        let handle = TaskHandle::next();

        self.with_state(|state| {
            state.queue.insert((deadline, handle), callback);
            state.deadlines.insert(handle, deadline);
        });
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.with_state(|state| {
            if let Some(deadline) = state.deadlines.remove(&handle) {
                state.queue.remove(&(deadline, handle));
            }
        });
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now_millis())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<(&'static str, i64)>>>, ManualScheduler) {
        (
            Arc::new(Mutex::new(Vec::new())),
            ManualScheduler::new(ManualClock::new(0)),
        )
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let (log, scheduler) = recorder();

        for (name, delay) in [("late", 300u64), ("early", 100), ("middle", 200)] {
            let log = log.clone();
            let clock = scheduler.clock().clone();
            scheduler.schedule_after(
                Duration::from_millis(delay),
                Box::new(move || log.lock().unwrap().push((name, clock.now_millis()))),
            );
        }

        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.next_deadline(), Some(100));
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("early", 100), ("middle", 200), ("late", 300)]
        );
        assert_eq!(scheduler.clock().now_millis(), 1000);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let handle = scheduler.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.cancel(handle);
        // Cancelling twice is harmless.
        scheduler.cancel(handle);

        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rearming_callback_fires_within_window() {
        fn arm(scheduler: ManualScheduler, fired: Arc<AtomicUsize>) {
            let next = scheduler.clone();
            scheduler.schedule_after(
                Duration::from_millis(100),
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                    arm(next, fired);
                }),
            );
        }

        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let fired = Arc::new(AtomicUsize::new(0));
        arm(scheduler.clone(), fired.clone());

        assert_eq!(scheduler.advance(Duration::from_millis(350)), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_deadline(), Some(400));
    }

    #[test]
    fn test_advance_to_never_moves_backwards() {
        let scheduler = ManualScheduler::new(ManualClock::new(500));
        assert_eq!(scheduler.advance_to(100), 0);
        assert_eq!(scheduler.clock().now_millis(), 500);
    }

    #[test]
    fn test_zero_delay_waits_for_advance() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        scheduler.schedule_after(
            Duration::ZERO,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.advance(Duration::ZERO), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
