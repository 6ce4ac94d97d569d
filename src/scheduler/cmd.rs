use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bubbletea_rs::{tick as bubbletea_tick, Cmd, Msg};

use super::{Callback, Scheduler, TaskHandle};

// Internal ID management for scheduler instances
static LAST_ID: AtomicI64 = AtomicI64::new(0);

fn next_id() -> i64 {
    LAST_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Message delivered by the bubbletea-rs runtime when a scheduled delay elapses.
///
/// Route every message through [`CmdScheduler::dispatch`]; messages that do
/// not belong to the scheduler are left alone.
#[derive(Debug, Clone)]
pub struct ScheduledMsg {
    /// The scheduler that queued the delay.
    pub scheduler: i64,
    /// The callback to run.
    pub handle: TaskHandle,
}

/// Scheduler for bubbletea-rs programs.
///
/// bubbletea-rs has no way to take back a command once it has been handed to
/// the runtime, so cancellation works the same way the widget tick tags do:
/// the callback is forgotten and the message that eventually arrives is
/// ignored.
///
/// Commands queued by [`schedule_after`](Scheduler::schedule_after) must be
/// collected with [`take_cmds`](Self::take_cmds) and returned from `update`.
#[derive(Clone)]
pub struct CmdScheduler {
    id: i64,
    state: Arc<Mutex<CmdState>>,
}

#[derive(Default)]
struct CmdState {
    callbacks: HashMap<TaskHandle, Callback>,
    cmds: Vec<Cmd>,
}

impl CmdScheduler {
    /// Creates a scheduler with a fresh unique ID.
    pub fn new() -> Self {
        Self {
            id: next_id(),
            state: Arc::new(Mutex::new(CmdState::default())),
        }
    }

    /// The unique ID stamped on this scheduler's messages.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Number of callbacks waiting for their message.
    pub fn pending(&self) -> usize {
        self.lock().callbacks.len()
    }

    /// Handles of the callbacks waiting for their message, oldest first.
    pub fn pending_handles(&self) -> Vec<TaskHandle> {
        let mut handles: Vec<TaskHandle> = self.lock().callbacks.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Drains the commands queued since the last call.
    pub fn take_cmds(&self) -> Vec<Cmd> {
        std::mem::take(&mut self.lock().cmds)
    }

    /// Runs the callback a [`ScheduledMsg`] refers to.
    ///
    /// Returns `true` when the message belonged to this scheduler, whether or
    /// not its callback was still live.
    pub fn dispatch(&self, msg: &Msg) -> bool {
        let Some(scheduled) = msg.downcast_ref::<ScheduledMsg>() else {
            return false;
        };
        if scheduled.scheduler != self.id {
            return false;
        }

        let callback = self.lock().callbacks.remove(&scheduled.handle);
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CmdState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CmdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for CmdScheduler {
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = TaskHandle::next();
        let scheduler = self.id;
        let cmd = bubbletea_tick(delay, move |_| {
            Box::new(ScheduledMsg { scheduler, handle }) as Msg
        });

        let mut state = self.lock();
        state.callbacks.insert(handle, callback);
        state.cmds.push(cmd);
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.lock().callbacks.remove(&handle);
    }
}

impl fmt::Debug for CmdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CmdScheduler")
            .field("id", &self.id)
            .field("pending", &state.callbacks.len())
            .field("queued_cmds", &state.cmds.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(fired: &Arc<AtomicUsize>) -> Callback {
        let fired = Arc::clone(fired);
        Box::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_schedule_queues_a_command() {
        let scheduler = CmdScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after(Duration::from_secs(1), counting(&fired));
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.take_cmds().len(), 1);
        // Draining twice yields nothing new.
        assert!(scheduler.take_cmds().is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_runs_matching_callback_once() {
        let scheduler = CmdScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule_after(Duration::from_secs(1), counting(&fired));

        let msg: Msg = Box::new(ScheduledMsg {
            scheduler: scheduler.id(),
            handle,
        });
        assert!(scheduler.dispatch(&msg));
        assert!(scheduler.dispatch(&msg));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_dispatch_ignores_foreign_messages() {
        let scheduler = CmdScheduler::new();
        let other = CmdScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule_after(Duration::from_secs(1), counting(&fired));

        let foreign: Msg = Box::new(ScheduledMsg {
            scheduler: other.id(),
            handle,
        });
        assert!(!scheduler.dispatch(&foreign));

        let unrelated: Msg = Box::new(42u32);
        assert!(!scheduler.dispatch(&unrelated));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancelled_callback_is_skipped() {
        let scheduler = CmdScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule_after(Duration::from_secs(1), counting(&fired));
        scheduler.cancel(handle);

        let msg: Msg = Box::new(ScheduledMsg {
            scheduler: scheduler.id(),
            handle,
        });
        assert!(scheduler.dispatch(&msg));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(CmdScheduler::new().id(), CmdScheduler::new().id());
    }
}
