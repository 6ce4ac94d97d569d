use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::{Callback, Scheduler, TaskHandle};

/// Real-time scheduler backed by a tokio runtime.
///
/// Each callback gets its own task that sleeps for the delay and then runs
/// the callback on a runtime worker. Cancelling aborts the task; a callback
/// whose task already woke up is still suppressed, because the task checks
/// that its handle is registered before running.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    tasks: Arc<Mutex<HashMap<TaskHandle, AbortHandle>>>,
}

impl TokioScheduler {
    /// Creates a scheduler that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a scheduler for the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of callbacks waiting to fire.
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = TaskHandle::next();
        let tasks = Arc::clone(&self.tasks);

        // Registration happens under the lock, so the task cannot look itself
        // up before it has been inserted.
        let mut registered = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&handle)
                .is_some();
            if live {
                callback();
            }
        });
        registered.insert(handle, join.abort_handle());
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        let removed = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        if let Some(task) = removed {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(fired: &Arc<AtomicUsize>) -> Callback {
        let fired = Arc::clone(fired);
        Box::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let scheduler = TokioScheduler::try_current().expect("inside a runtime");
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after(Duration::from_secs(1), counting(&fired));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_callback() {
        let scheduler = TokioScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.schedule_after(Duration::from_secs(1), counting(&fired));
        scheduler.cancel(handle);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(TokioScheduler::try_current().is_none());
    }
}
