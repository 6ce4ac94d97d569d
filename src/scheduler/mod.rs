//! Delayed callbacks.
//!
//! A [`Scheduler`] runs a callback once after a delay and lets the caller
//! cancel it before it fires. It stands in for whatever delayed-message
//! facility the host event loop offers; the countdown controller only ever
//! keeps one callback outstanding and re-arms it from inside the callback.
//!
//! Three implementations ship with the crate:
//!
//! - [`ManualScheduler`]: deterministic, driven by a [`ManualClock`](crate::clock::ManualClock).
//!   Time only moves when [`ManualScheduler::advance`] is called.
//! - [`TokioScheduler`]: real time on a tokio runtime.
//! - [`CmdScheduler`]: bubbletea-rs programs. Delays become `Cmd`s and the
//!   callback runs when the resulting message is routed back through `update`.

mod cmd;
mod manual;
mod runtime;

pub use cmd::{CmdScheduler, ScheduledMsg};
pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A callback handed to a [`Scheduler`]. Runs at most once.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

// Handles are unique across every scheduler in the process.
static LAST_HANDLE: AtomicU64 = AtomicU64::new(0);

/// Identifies one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub(crate) fn next() -> Self {
        TaskHandle(LAST_HANDLE.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The raw handle value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Runs callbacks after a delay.
///
/// Callbacks never run synchronously from inside `schedule_after`, and a
/// cancelled callback never runs. Cancelling a handle that already fired, or
/// was already cancelled, does nothing.
pub trait Scheduler: Send + Sync {
    /// Arranges for `callback` to run once, `delay` from now.
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TaskHandle;

    /// Cancels a pending callback.
    fn cancel(&self, handle: TaskHandle);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TaskHandle {
        (**self).schedule_after(delay, callback)
    }

    fn cancel(&self, handle: TaskHandle) {
        (**self).cancel(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = TaskHandle::next();
        let b = TaskHandle::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
