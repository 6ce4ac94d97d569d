//! Countdown component for Bubble Tea applications.
//!
//! This module wraps a [`CountdownController`] in a bubbletea-rs model. The
//! controller's one-second ticks are scheduled as bubbletea-rs commands, so
//! the countdown advances as long as the application forwards messages to
//! [`Model::update`] and returns the command it gets back.
//!
//! Unlike a duration-based timer, the countdown targets an absolute instant
//! (milliseconds since the UNIX epoch) and always shows the time left until
//! that instant, even if ticks are delayed.
//!
//! # Basic Usage
//!
//! ```rust
//! use countdown_chronometer::timer::new;
//!
//! // Count down to five minutes from now.
//! let countdown = new(countdown_chronometer::timer::now_millis() + 5 * 60 * 1000);
//! assert!(!countdown.running());
//! ```
//!
//! # bubbletea-rs Integration
//!
//! ```rust
//! use bubbletea_rs::{Model as BubbleTeaModel, Msg, Cmd};
//! use countdown_chronometer::timer::{new, now_millis, Model, TimeoutMsg};
//!
//! struct MyApp {
//!     countdown: Model,
//!     done: bool,
//! }
//!
//! impl BubbleTeaModel for MyApp {
//!     fn init() -> (Self, Option<Cmd>) {
//!         let countdown = new(now_millis() + 10_000);
//!         let cmd = countdown.init();
//!         (Self { countdown, done: false }, Some(cmd))
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Option<Cmd> {
//!         if let Some(timeout) = msg.downcast_ref::<TimeoutMsg>() {
//!             if timeout.id == self.countdown.id() {
//!                 self.done = true;
//!             }
//!         }
//!         self.countdown.update(msg)
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("Time left: {}", self.countdown.view())
//!     }
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bubbletea_rs::{batch, tick as bubbletea_tick, Cmd, Model as BubbleTeaModel, Msg};
use lipgloss_extras::prelude::*;

use crate::clock::{Clock, SystemClock};
use crate::controller::{CountdownController, CountdownOption, CountdownPhase};
use crate::scheduler::CmdScheduler;

/// Message delivered when a scheduled tick is due.
///
/// Applications never need to construct this; just forward every message to
/// [`Model::update`].
pub use crate::scheduler::ScheduledMsg as TickMsg;

/// Message used to start and stop countdown instances.
///
/// Sent by the commands returned from [`Model::start`], [`Model::stop`] and
/// [`Model::toggle`]. An `id` of zero addresses every countdown.
#[derive(Debug, Clone)]
pub struct StartStopMsg {
    /// The countdown this message targets.
    pub id: i64,
    running: bool,
}

/// Message sent once when a running countdown reaches zero.
#[derive(Debug, Clone)]
pub struct TimeoutMsg {
    /// The countdown that completed.
    pub id: i64,
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
///
/// Convenience for computing a target instant: `now_millis() + 60_000`.
pub fn now_millis() -> i64 {
    SystemClock::new().now_millis()
}

/// Countdown component.
///
/// The component owns its controller and installs a completion listener on
/// it that produces [`TimeoutMsg`]. The controller is reachable through
/// [`Model::controller`] for formats and tick listeners; replacing its
/// completion listener stops `TimeoutMsg` from being sent.
pub struct Model {
    /// Style applied to the rendered text in [`Model::view`].
    pub style: Style,
    controller: CountdownController,
    scheduler: CmdScheduler,
    timeouts: Arc<Mutex<Vec<Cmd>>>,
}

/// Creates a countdown to `base` (milliseconds since the epoch) on the wall clock.
///
/// The countdown starts stopped; return [`Model::init`] or [`Model::start`]
/// from your program to get it going.
pub fn new(base: i64) -> Model {
    new_with_options(base, &[])
}

/// Creates a countdown to `base` with additional controller options.
///
/// ```rust
/// use countdown_chronometer::controller::with_format;
/// use countdown_chronometer::timer::new_with_options;
///
/// let countdown = new_with_options(0, &[with_format("Time left: %s")]);
/// assert_eq!(countdown.controller().text(), "Time left: 00");
/// ```
pub fn new_with_options(base: i64, opts: &[CountdownOption]) -> Model {
    Model::with_clock(SystemClock::new(), base, opts)
}

impl Model {
    /// Creates a countdown that reads time from `clock`.
    pub fn with_clock(clock: impl Clock + 'static, base: i64, opts: &[CountdownOption]) -> Self {
        let scheduler = CmdScheduler::new();
        let timeouts: Arc<Mutex<Vec<Cmd>>> = Arc::new(Mutex::new(Vec::new()));

        let mut all = Vec::with_capacity(opts.len() + 2);
        all.push(crate::controller::with_base(base));
        all.extend(opts.iter().cloned());

        let completions = Arc::clone(&timeouts);
        all.push(crate::controller::with_on_complete(move |c| {
            let id = c.id();
            let cmd = bubbletea_tick(Duration::from_nanos(1), move |_| {
                Box::new(TimeoutMsg { id }) as Msg
            });
            completions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(cmd);
        }));

        let controller = CountdownController::with_options(clock, scheduler.clone(), &all);
        Self {
            style: Style::new(),
            controller,
            scheduler,
            timeouts,
        }
    }

    /// Sets the style used by [`Model::view`].
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Unique identifier of this countdown.
    pub fn id(&self) -> i64 {
        self.controller.id()
    }

    /// The underlying controller.
    pub fn controller(&self) -> &CountdownController {
        &self.controller
    }

    /// Whether the countdown is ticking.
    pub fn running(&self) -> bool {
        self.controller.is_running()
    }

    /// Whether the countdown reached zero while started.
    pub fn timedout(&self) -> bool {
        self.controller.phase() == CountdownPhase::Completed
    }

    /// Creates a command that starts the countdown.
    ///
    /// The command delivers a [`StartStopMsg`] almost immediately. Nothing
    /// changes until that message reaches [`Model::update`], which starts the
    /// controller and returns the command for the first tick. If the target
    /// instant has already passed, the countdown shows `00` and no
    /// [`TimeoutMsg`] is sent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_rs::{Cmd, KeyMsg, Model as BubbleTeaModel, Msg};
    /// use countdown_chronometer::timer::{new, now_millis, Model};
    /// use crossterm::event::KeyCode;
    ///
    /// struct App {
    ///     countdown: Model,
    /// }
    ///
    /// impl BubbleTeaModel for App {
    ///     fn init() -> (Self, Option<Cmd>) {
    ///         let countdown = new(now_millis() + 30_000);
    ///         (Self { countdown }, None)
    ///     }
    ///
    ///     fn update(&mut self, msg: Msg) -> Option<Cmd> {
    ///         if let Some(key) = msg.downcast_ref::<KeyMsg>() {
    ///             match key.key {
    ///                 KeyCode::Char('s') => return Some(self.countdown.start()),
    ///                 KeyCode::Char('p') => return Some(self.countdown.stop()),
    ///                 _ => {}
    ///             }
    ///         }
    ///         self.countdown.update(msg)
    ///     }
    ///
    ///     fn view(&self) -> String {
    ///         self.countdown.view()
    ///     }
    /// }
    /// ```
    pub fn start(&self) -> Cmd {
        self.start_stop(true)
    }

    /// Creates a command that stops the countdown.
    ///
    /// When the resulting [`StartStopMsg`] is handled the pending tick is
    /// forgotten; its message, if it still arrives, is ignored. The target
    /// instant is kept, so starting again shows the time left at that moment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use countdown_chronometer::timer::{new, now_millis};
    ///
    /// let countdown = new(now_millis() + 30_000);
    /// let _cmd = countdown.stop();
    /// assert!(!countdown.running());
    /// ```
    pub fn stop(&self) -> Cmd {
        self.start_stop(false)
    }

    /// Creates a command that flips between started and stopped.
    ///
    /// The direction is decided now, from whether the countdown is currently
    /// started, not when the message is delivered. A completed countdown is
    /// still started, so toggling it stops it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_rs::{Cmd, KeyMsg};
    /// use countdown_chronometer::timer::Model;
    /// use crossterm::event::KeyCode;
    ///
    /// fn on_key(countdown: &Model, key: &KeyMsg) -> Option<Cmd> {
    ///     (key.key == KeyCode::Char(' ')).then(|| countdown.toggle())
    /// }
    /// ```
    pub fn toggle(&self) -> Cmd {
        self.start_stop(!self.controller.is_started())
    }

    /// Moves the target instant. Returns the command to schedule, if the
    /// countdown (re)started as a result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use countdown_chronometer::clock::ManualClock;
    /// use countdown_chronometer::timer::Model;
    ///
    /// let mut countdown = Model::with_clock(ManualClock::new(0), 0, &[]);
    /// // Stopped: the text changes but nothing is scheduled.
    /// assert!(countdown.set_base(90_000).is_none());
    /// assert_eq!(countdown.controller().text(), "01:30");
    /// ```
    pub fn set_base(&mut self, base: i64) -> Option<Cmd> {
        self.controller.set_base(base);
        self.next_cmd()
    }

    /// Host visibility signal; a hidden countdown does not tick.
    pub fn set_visible(&mut self, visible: bool) -> Option<Cmd> {
        self.controller.set_visible(visible);
        self.next_cmd()
    }

    fn start_stop(&self, running: bool) -> Cmd {
        let id = self.id();
        bubbletea_tick(Duration::from_nanos(1), move |_| {
            Box::new(StartStopMsg { id, running }) as Msg
        })
    }

    /// Collects every command produced since the last call: scheduled ticks
    /// and timeout notifications. Several are combined with `batch`.
    fn next_cmd(&mut self) -> Option<Cmd> {
        let mut cmds = self.scheduler.take_cmds();
        cmds.append(&mut self.timeouts.lock().unwrap_or_else(PoisonError::into_inner));
        match cmds.len() {
            0 => None,
            1 => cmds.pop(),
            _ => Some(batch(cmds)),
        }
    }

    /// Starts the countdown.
    pub fn init(&self) -> Cmd {
        self.start()
    }

    /// Handles start/stop and tick messages addressed to this countdown.
    ///
    /// Forward every message your application receives; messages for other
    /// components and other countdowns are ignored and return `None`. The
    /// returned command carries the next tick and, when the countdown has just
    /// reached zero, the [`TimeoutMsg`]. Always return it from your own
    /// `update`, otherwise the countdown stops advancing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_rs::{Cmd, Msg};
    /// use countdown_chronometer::timer::{Model, TimeoutMsg};
    ///
    /// struct App {
    ///     countdown: Model,
    ///     finished: bool,
    /// }
    ///
    /// impl App {
    ///     fn update(&mut self, msg: Msg) -> Option<Cmd> {
    ///         if let Some(timeout) = msg.downcast_ref::<TimeoutMsg>() {
    ///             if timeout.id == self.countdown.id() {
    ///                 self.finished = true;
    ///                 return None;
    ///             }
    ///         }
    ///         self.countdown.update(msg)
    ///     }
    /// }
    /// ```
    pub fn update(&mut self, msg: Msg) -> Option<Cmd> {
        if let Some(start_stop_msg) = msg.downcast_ref::<StartStopMsg>() {
            if start_stop_msg.id != 0 && start_stop_msg.id != self.id() {
                return None;
            }
            self.controller.set_started(start_stop_msg.running);
            return self.next_cmd();
        }

        if self.scheduler.dispatch(&msg) {
            return self.next_cmd();
        }

        None
    }

    /// Renders the remaining time with [`Model::style`].
    ///
    /// The text is whatever the controller rendered last: the built-in
    /// `SS`, `MM:SS`, `H:MM:SS` or `D:HH:MM:SS` layout, or the custom and
    /// outer formats when set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use countdown_chronometer::clock::ManualClock;
    /// use countdown_chronometer::controller::with_format;
    /// use countdown_chronometer::timer::Model;
    /// use lipgloss_extras::prelude::*;
    ///
    /// let countdown = Model::with_clock(ManualClock::new(0), 65_000, &[with_format("T-%s")])
    ///     .with_style(Style::new().bold(true));
    /// assert!(countdown.view().contains("T-01:05"));
    /// ```
    pub fn view(&self) -> String {
        self.style.render(&self.controller.text())
    }
}

impl BubbleTeaModel for Model {
    fn init() -> (Self, Option<Cmd>) {
        let model = new(now_millis() + 60_000);
        let cmd = model.init();
        (model, Some(cmd))
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        self.update(msg)
    }

    fn view(&self) -> String {
        self.view()
    }
}

impl Default for Model {
    fn default() -> Self {
        new(now_millis() + 60_000)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("style", &self.style)
            .field("controller", &self.controller)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::controller::{with_custom_chrono_format, with_format};

    fn strip(s: &str) -> String {
        strip_ansi_escapes::strip_str(s)
    }

    fn manual(base: i64) -> (ManualClock, Model) {
        let clock = ManualClock::new(0);
        let model = Model::with_clock(clock.clone(), base, &[]);
        (clock, model)
    }

    fn scheduled_msg(model: &Model) -> Msg {
        // The only pending callback belongs to the controller's current chain;
        // rebuild the message the runtime would deliver for it.
        let handle = model
            .scheduler
            .pending_handles()
            .into_iter()
            .next()
            .expect("a tick should be pending");
        Box::new(TickMsg {
            scheduler: model.scheduler.id(),
            handle,
        })
    }

    #[test]
    fn test_new_is_stopped() {
        let (_, model) = manual(5000);
        assert!(!model.running());
        assert!(!model.timedout());
        assert!(model.id() > 0);
        assert_eq!(strip(&model.view()), "05");
    }

    #[test]
    fn test_unique_ids() {
        let (_, a) = manual(0);
        let (_, b) = manual(0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_start_stop_toggle_commands() {
        let (_, model) = manual(5000);
        let _start_cmd = model.start();
        let _stop_cmd = model.stop();
        let _toggle_cmd = model.toggle();
        let _init_cmd = model.init();
        // Commands do nothing until their messages are delivered.
        assert!(!model.running());
    }

    #[test]
    fn test_update_with_start_stop_msg() {
        let (_, mut model) = manual(5000);
        let start = StartStopMsg {
            id: model.id(),
            running: true,
        };

        let cmd = model.update(Box::new(start));
        assert!(cmd.is_some()); // the first tick
        assert!(model.running());

        let stop = StartStopMsg {
            id: model.id(),
            running: false,
        };
        assert!(model.update(Box::new(stop)).is_none());
        assert!(!model.running());
    }

    #[test]
    fn test_update_with_wrong_id() {
        let (_, mut model) = manual(5000);
        let wrong = StartStopMsg {
            id: model.id() + 999,
            running: true,
        };
        assert!(model.update(Box::new(wrong)).is_none());
        assert!(!model.running());
    }

    #[test]
    fn test_broadcast_start_stop() {
        let (_, mut model) = manual(5000);
        let all = StartStopMsg { id: 0, running: true };
        assert!(model.update(Box::new(all)).is_some());
        assert!(model.running());
    }

    #[test]
    fn test_ticks_until_timeout() {
        let (clock, mut model) = manual(2000);
        model.update(Box::new(StartStopMsg {
            id: model.id(),
            running: true,
        }));

        clock.advance(Duration::from_secs(1));
        let msg = scheduled_msg(&model);
        assert!(model.update(msg).is_some()); // next tick
        assert_eq!(strip(&model.view()), "01");
        assert!(model.running());

        clock.advance(Duration::from_secs(1));
        let msg = scheduled_msg(&model);
        let cmd = model.update(msg);
        assert!(cmd.is_some()); // the timeout notification
        assert_eq!(strip(&model.view()), "00");
        assert!(!model.running());
        assert!(model.timedout());
        assert_eq!(model.scheduler.pending(), 0);

        // Timeouts are for the host; the countdown has nothing left to send.
        let id = model.id();
        assert!(model.update(Box::new(TimeoutMsg { id })).is_none());
    }

    #[test]
    fn test_set_base_restarts_after_timeout() {
        let (clock, mut model) = manual(1000);
        model.update(Box::new(StartStopMsg {
            id: model.id(),
            running: true,
        }));
        clock.advance(Duration::from_secs(1));
        let msg = scheduled_msg(&model);
        model.update(msg);
        assert!(model.timedout());

        // The host keeps the TimeoutMsg to itself; the countdown still restarts.
        assert!(model.set_base(clock.now_millis() + 30_000).is_some());
        assert!(model.running());
        assert_eq!(strip(&model.view()), "30");

        clock.advance(Duration::from_secs(1));
        let msg = scheduled_msg(&model);
        assert!(model.update(msg).is_some());
        assert_eq!(strip(&model.view()), "29");
    }

    #[test]
    fn test_pending_commands_are_released_together() {
        let (_, mut model) = manual(10_000);
        // Driving the controller directly queues a tick per restart.
        model.controller().start();
        model.controller().stop();
        model.controller().start();

        assert!(model.set_visible(true).is_some());
        assert!(model.scheduler.take_cmds().is_empty());
        assert!(model.timeouts.lock().unwrap().is_empty());
        assert_eq!(model.scheduler.pending(), 1);
    }

    #[test]
    fn test_visibility_pauses() {
        let (_, mut model) = manual(10_000);
        model.update(Box::new(StartStopMsg {
            id: model.id(),
            running: true,
        }));
        assert!(model.set_visible(false).is_none());
        assert!(!model.running());
        assert!(model.set_visible(true).is_some());
        assert!(model.running());
    }

    #[test]
    fn test_unrelated_messages_are_ignored() {
        let (_, mut model) = manual(10_000);
        assert!(model.update(Box::new("hello")).is_none());
        assert!(model.update(Box::new(TimeoutMsg { id: model.id() + 1 })).is_none());
    }

    #[test]
    fn test_view_uses_formats() {
        let clock = ManualClock::new(0);
        let model = Model::with_clock(
            clock,
            90_061_000,
            &[
                with_custom_chrono_format("%1$dd %2$02dh %3$02dm %4$02ds"),
                with_format("Time left: %s"),
            ],
        );
        assert_eq!(strip(&model.view()), "Time left: 1d 01h 01m 01s");
    }

    #[test]
    fn test_view_with_style_keeps_text() {
        let (_, model) = manual(65_000);
        let model = model.with_style(Style::new().bold(true));
        assert_eq!(strip(&model.view()), "01:05");
    }

    #[test]
    fn test_default_countdown() {
        let model = Model::default();
        assert!(!model.running());
        let text = strip(&model.view());
        assert!(text == "01:00" || text == "59", "unexpected view {}", text);
    }
}
