//! The countdown state machine.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use super::types::{CountdownOption, CountdownPhase, Listener, TextSink};
use crate::clock::Clock;
use crate::format::{remaining_seconds, render_into, FormatSpec};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::template::{PrintfEngine, TemplateEngine};

/// Default tick cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);

static DEFAULT_ENGINE: Lazy<Arc<dyn TemplateEngine>> = Lazy::new(|| Arc::new(PrintfEngine));

// Internal ID management for controller instances
static LAST_ID: AtomicI64 = AtomicI64::new(0);

fn next_id() -> i64 {
    LAST_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Drives one countdown: owns its state, keeps at most one tick scheduled,
/// renders the remaining time and notifies listeners.
///
/// The controller is a cheap handle; clones share the same countdown. When
/// the last handle is dropped the pending tick is cancelled, and a tick that
/// still manages to fire afterwards finds nothing to update.
///
/// # Lifecycle
///
/// `running` is `started && visible`, forced off once the target instant is
/// reached. Starting an already expired countdown renders `00` but neither
/// schedules ticks nor fires the completion listener; completion is only ever
/// reported from a running tick.
///
/// # Examples
///
/// ```rust
/// use countdown_chronometer::clock::ManualClock;
/// use countdown_chronometer::controller::{CountdownController, CountdownPhase};
/// use countdown_chronometer::scheduler::ManualScheduler;
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0);
/// let scheduler = ManualScheduler::new(clock.clone());
/// let countdown = CountdownController::new(clock, scheduler.clone());
///
/// countdown.set_base(65_000);
/// countdown.start();
/// assert_eq!(countdown.text(), "01:05");
/// assert_eq!(countdown.phase(), CountdownPhase::Running);
///
/// scheduler.advance(Duration::from_secs(65));
/// assert_eq!(countdown.text(), "00");
/// assert_eq!(countdown.phase(), CountdownPhase::Completed);
/// ```
#[derive(Clone)]
pub struct CountdownController {
    inner: Arc<Inner>,
}

struct Inner {
    id: i64,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    engine: Arc<dyn TemplateEngine>,
    interval: Duration,
    state: Mutex<CountdownState>,
}

struct CountdownState {
    base: i64,
    started: bool,
    visible: bool,
    running: bool,
    completed: bool,
    has_logged_format_warning: bool,
    spec: FormatSpec,
    pending: Option<TaskHandle>,
    // Bumped every time a tick is armed; a firing tick with an older tag is stale.
    tag: u64,
    text: String,
    scratch: String,
    on_tick: Option<Listener>,
    on_complete: Option<Listener>,
    sink: Option<Arc<dyn TextSink>>,
}

/// Side effects collected under the lock and performed after releasing it.
enum Effect {
    Display(Arc<dyn TextSink>, String),
    Notify(Listener),
}

impl CountdownController {
    /// Creates a stopped countdown with base `0`, reading time from `clock`
    /// and scheduling ticks on `scheduler`.
    pub fn new(clock: impl Clock + 'static, scheduler: impl Scheduler + 'static) -> Self {
        Self::with_options(clock, scheduler, &[])
    }

    /// Creates a stopped countdown configured by `opts`.
    ///
    /// The initial text is rendered immediately and handed to the text sink,
    /// if one is configured. No listener fires during construction.
    pub fn with_options(
        clock: impl Clock + 'static,
        scheduler: impl Scheduler + 'static,
        opts: &[CountdownOption],
    ) -> Self {
        let mut engine = Arc::clone(&DEFAULT_ENGINE);
        let mut interval = TICK_INTERVAL;
        let mut state = CountdownState {
            base: 0,
            started: false,
            visible: true,
            running: false,
            completed: false,
            has_logged_format_warning: false,
            spec: FormatSpec::default(),
            pending: None,
            tag: 0,
            text: String::new(),
            scratch: String::with_capacity(8),
            on_tick: None,
            on_complete: None,
            sink: None,
        };

        for opt in opts {
            match opt {
                CountdownOption::WithBase(base) => state.base = *base,
                CountdownOption::WithFormat(f) => state.spec.outer_template = Some(f.clone()),
                CountdownOption::WithCustomChronoFormat(f) => {
                    state.spec.custom_inner_template = Some(f.clone())
                }
                CountdownOption::WithVisible(visible) => state.visible = *visible,
                CountdownOption::WithInterval(d) if d.is_zero() => {
                    warn!("zero tick interval ignored, using {:?}", TICK_INTERVAL);
                    interval = TICK_INTERVAL;
                }
                CountdownOption::WithInterval(d) => interval = *d,
                CountdownOption::WithTextSink(sink) => state.sink = Some(Arc::clone(sink)),
                CountdownOption::WithTemplateEngine(e) => engine = Arc::clone(e),
                CountdownOption::WithOnTick(l) => state.on_tick = Some(Arc::clone(l)),
                CountdownOption::WithOnComplete(l) => state.on_complete = Some(Arc::clone(l)),
            }
        }

        let controller = Self {
            inner: Arc::new(Inner {
                id: next_id(),
                clock: Arc::new(clock),
                scheduler: Arc::new(scheduler),
                engine,
                interval,
                state: Mutex::new(state),
            }),
        };

        let effects = {
            let mut guard = controller.lock();
            let state = &mut *guard;
            let mut effects = Vec::new();
            controller.recompute(state);
            controller.display(state, &mut effects);
            effects
        };
        controller.perform(effects);
        controller
    }

    /// Unique identifier of this countdown.
    pub fn id(&self) -> i64 {
        self.inner.id
    }

    /// Sets the target instant (milliseconds since the epoch).
    ///
    /// The remaining time is recomputed and rendered at once, the tick
    /// listener fires whether or not the countdown is running, and running is
    /// reconciled as if `started` had been toggled. A completed countdown that
    /// is still started and visible therefore resumes when its base is pushed
    /// into the future.
    ///
    /// The tick listener fires exactly once per call, including when the
    /// call restarts a completed countdown.
    ///
    /// # Arguments
    ///
    /// * `base` - The target instant in milliseconds since the UNIX epoch.
    ///   Instants in the past are allowed and render as `00`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use countdown_chronometer::clock::{Clock, ManualClock};
    /// use countdown_chronometer::controller::{with_on_tick, CountdownController, CountdownPhase};
    /// use countdown_chronometer::scheduler::ManualScheduler;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new(0);
    /// let scheduler = ManualScheduler::new(clock.clone());
    /// let ticks = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&ticks);
    /// let countdown = CountdownController::with_options(
    ///     clock.clone(),
    ///     scheduler.clone(),
    ///     &[with_on_tick(move |_| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///     })],
    /// );
    ///
    /// // While stopped, the new time is shown and listeners hear about it,
    /// // but nothing is scheduled.
    /// countdown.set_base(3_661_000);
    /// assert_eq!(countdown.text(), "1:01:01");
    /// assert_eq!(ticks.load(Ordering::SeqCst), 1);
    /// assert_eq!(scheduler.pending(), 0);
    ///
    /// // A completed countdown resumes when pushed into the future.
    /// countdown.set_base(1_000);
    /// countdown.start();
    /// scheduler.advance(Duration::from_secs(1));
    /// assert_eq!(countdown.phase(), CountdownPhase::Completed);
    ///
    /// countdown.set_base(clock.now_millis() + 5_000);
    /// assert_eq!(countdown.phase(), CountdownPhase::Running);
    /// assert_eq!(countdown.text(), "05");
    /// ```
    pub fn set_base(&self, base: i64) {
        let effects = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut effects = Vec::new();

            state.base = base;
            self.recompute(state);
            self.display(state, &mut effects);
            if let Some(l) = &state.on_tick {
                effects.push(Effect::Notify(Arc::clone(l)));
            }
            self.update_running(state, &mut effects, false);
            effects
        };
        self.perform(effects);
    }

    /// The target instant (milliseconds since the epoch).
    pub fn base(&self) -> i64 {
        self.lock().base
    }

    /// Sets the outer format string (one `%s` placeholder), or clears it.
    ///
    /// Takes effect on the next render.
    pub fn set_format(&self, format: Option<String>) {
        self.lock().spec.outer_template = format;
    }

    /// The outer format string, if any.
    pub fn format(&self) -> Option<String> {
        self.lock().spec.outer_template.clone()
    }

    /// Sets the custom chrono format, or clears it to restore the fast path.
    ///
    /// The template receives days, hours, minutes and seconds as positional
    /// arguments 1 to 4, e.g.
    /// `"%1$02d days, %2$02d hours, %3$02d minutes and %4$02d seconds remaining"`.
    /// Takes effect on the next render.
    pub fn set_custom_chrono_format(&self, format: Option<String>) {
        self.lock().spec.custom_inner_template = format;
    }

    /// The custom chrono format, if any.
    pub fn custom_chrono_format(&self) -> Option<String> {
        self.lock().spec.custom_inner_template.clone()
    }

    /// Sets or clears the tick listener.
    pub fn set_on_tick_listener(&self, listener: Option<Listener>) {
        self.lock().on_tick = listener;
    }

    /// The tick listener, if any.
    pub fn on_tick_listener(&self) -> Option<Listener> {
        self.lock().on_tick.clone()
    }

    /// Sets or clears the completion listener.
    pub fn set_on_complete_listener(&self, listener: Option<Listener>) {
        self.lock().on_complete = listener;
    }

    /// The completion listener, if any.
    pub fn on_complete_listener(&self) -> Option<Listener> {
        self.lock().on_complete.clone()
    }

    /// Sets or clears the text sink.
    pub fn set_text_sink(&self, sink: Option<Arc<dyn TextSink>>) {
        self.lock().sink = sink;
    }

    /// Starts counting down. Calling it while already running does nothing.
    ///
    /// Every `start` should eventually be matched by a [`stop`](Self::stop)
    /// (or by dropping the controller) so the recurring tick is released.
    ///
    /// Starting renders the current remaining time. If time remains, the tick
    /// listener fires and the first tick is scheduled one interval later. If
    /// the base has already passed, the countdown shows `00` and goes
    /// straight to [`CountdownPhase::Completed`] without notifying anyone.
    /// A hidden countdown (see [`set_visible`](Self::set_visible)) records
    /// the request and starts once it becomes visible.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use countdown_chronometer::clock::ManualClock;
    /// use countdown_chronometer::controller::{with_base, CountdownController, CountdownPhase};
    /// use countdown_chronometer::scheduler::ManualScheduler;
    ///
    /// let clock = ManualClock::new(0);
    /// let scheduler = ManualScheduler::new(clock.clone());
    /// let countdown = CountdownController::with_options(clock, scheduler.clone(), &[with_base(10_000)]);
    ///
    /// countdown.start();
    /// countdown.start(); // no second tick chain
    /// assert!(countdown.is_running());
    /// assert_eq!(scheduler.pending(), 1);
    ///
    /// countdown.stop();
    /// assert_eq!(countdown.phase(), CountdownPhase::Stopped);
    /// assert_eq!(scheduler.pending(), 0);
    /// ```
    pub fn start(&self) {
        self.set_started(true);
    }

    /// Stops counting down and cancels the pending tick. The base is kept.
    ///
    /// The displayed text is left as it was; a later [`start`](Self::start)
    /// recomputes it from the clock, so time keeps passing while stopped.
    pub fn stop(&self) {
        self.set_started(false);
    }

    /// Same as [`start`](Self::start) or [`stop`](Self::stop).
    pub fn set_started(&self, started: bool) {
        let effects = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut effects = Vec::new();
            state.started = started;
            self.update_running(state, &mut effects, true);
            effects
        };
        self.perform(effects);
    }

    /// Whether [`start`](Self::start) is in effect.
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// Host visibility signal. A hidden countdown does not tick.
    pub fn set_visible(&self, visible: bool) {
        let effects = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut effects = Vec::new();
            state.visible = visible;
            self.update_running(state, &mut effects, true);
            effects
        };
        self.perform(effects);
    }

    /// Whether the host reports the countdown as visible.
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// The host removed the countdown from its surface; equivalent to
    /// `set_visible(false)`.
    pub fn detach(&self) {
        self.set_visible(false);
    }

    /// Whether a tick is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> CountdownPhase {
        let state = self.lock();
        if state.running {
            CountdownPhase::Running
        } else if state.completed {
            CountdownPhase::Completed
        } else {
            CountdownPhase::Stopped
        }
    }

    /// The most recently rendered text.
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Whole seconds until the base, clamped at zero, as of now.
    pub fn remaining_seconds(&self) -> u64 {
        let base = self.lock().base;
        remaining_seconds(base, self.inner.clock.now_millis())
    }

    /// Whether a malformed-format warning has been logged. Once set it stays set.
    pub fn has_logged_format_warning(&self) -> bool {
        self.lock().has_logged_format_warning
    }

    fn lock(&self) -> MutexGuard<'_, CountdownState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Renders the current remaining time into `state.text`. Returns the
    /// remaining seconds.
    fn recompute(&self, state: &mut CountdownState) -> u64 {
        let remaining = remaining_seconds(state.base, self.inner.clock.now_millis());
        let rendered = render_into(
            &mut state.scratch,
            remaining,
            &state.spec,
            self.inner.engine.as_ref(),
        );

        if let Some(error) = rendered.error {
            if !state.has_logged_format_warning {
                state.has_logged_format_warning = true;
                warn!(
                    countdown = self.inner.id,
                    template = error.template(),
                    "Illegal format string: {}",
                    error
                );
            }
        }

        state.text = rendered.text;
        remaining
    }

    fn display(&self, state: &CountdownState, effects: &mut Vec<Effect>) {
        if let Some(sink) = &state.sink {
            effects.push(Effect::Display(Arc::clone(sink), state.text.clone()));
        }
    }

    /// Re-derives `running` from `started && visible` and reconciles the
    /// scheduled tick with it. `notify_start` is false when the caller has
    /// already queued a tick notification for this instant.
    fn update_running(
        &self,
        state: &mut CountdownState,
        effects: &mut Vec<Effect>,
        notify_start: bool,
    ) {
        let running = state.started && state.visible;

        if !running {
            if let Some(handle) = state.pending.take() {
                self.inner.scheduler.cancel(handle);
            }
            if state.running || state.completed {
                debug!(countdown = self.inner.id, "countdown stopped");
            }
            state.running = false;
            state.completed = false;
            return;
        }

        if state.running {
            return;
        }

        // Drop anything left over before starting a new chain.
        if let Some(handle) = state.pending.take() {
            self.inner.scheduler.cancel(handle);
        }

        let remaining = self.recompute(state);
        self.display(state, effects);
        if remaining > 0 {
            state.running = true;
            state.completed = false;
            self.arm(state);
            if notify_start {
                if let Some(l) = &state.on_tick {
                    effects.push(Effect::Notify(Arc::clone(l)));
                }
            }
            debug!(countdown = self.inner.id, remaining, "countdown started");
        } else {
            state.running = false;
            state.completed = true;
            debug!(countdown = self.inner.id, "countdown already expired");
        }
    }

    /// Schedules the next tick. The callback only holds a weak reference.
    fn arm(&self, state: &mut CountdownState) {
        state.tag = state.tag.wrapping_add(1);
        let tag = state.tag;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = self.inner.scheduler.schedule_after(
            self.inner.interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    CountdownController { inner }.on_scheduled_tick(tag);
                }
            }),
        );
        state.pending = Some(handle);
    }

    fn on_scheduled_tick(&self, tag: u64) {
        let effects = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let mut effects = Vec::new();

            // Stopped, or superseded by a newer chain.
            if !state.running || state.tag != tag {
                return;
            }
            state.pending = None;

            let remaining = self.recompute(state);
            self.display(state, &mut effects);
            if remaining > 0 {
                trace!(countdown = self.inner.id, remaining, "tick");
                self.arm(state);
                if let Some(l) = &state.on_tick {
                    effects.push(Effect::Notify(Arc::clone(l)));
                }
            } else {
                debug!(countdown = self.inner.id, "countdown complete");
                state.running = false;
                state.completed = true;
                if let Some(l) = &state.on_complete {
                    effects.push(Effect::Notify(Arc::clone(l)));
                }
            }
            effects
        };
        self.perform(effects);
    }

    fn perform(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Display(sink, text) => sink.set_text(&text),
                Effect::Notify(listener) => listener(self),
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = state.pending.take() {
            self.scheduler.cancel(handle);
        }
    }
}

impl fmt::Debug for CountdownController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CountdownController")
            .field("id", &self.inner.id)
            .field("base", &state.base)
            .field("started", &state.started)
            .field("visible", &state.visible)
            .field("running", &state.running)
            .field("completed", &state.completed)
            .field("text", &state.text)
            .finish()
    }
}
