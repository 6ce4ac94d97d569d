#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/countdown-chronometer/")]

//! # countdown-chronometer
//!
//! A countdown engine that shows the time left until a fixed instant,
//! refreshes it once a second and tells you when the instant has passed.
//!
//! ## Overview
//!
//! The crate is split into small layers that can be used on their own:
//!
//! - [`clock`]: where "now" comes from ([`SystemClock`](clock::SystemClock),
//!   or [`ManualClock`](clock::ManualClock) in tests).
//! - [`template`]: a printf-style formatter for user templates.
//! - [`format`]: turns a number of seconds into display text, through the
//!   built-in `SS` / `MM:SS` / `H:MM:SS` / `D:HH:MM:SS` layouts or a
//!   custom template, optionally wrapped in an outer template.
//! - [`scheduler`]: delayed, cancellable callbacks on a tokio runtime, a
//!   bubbletea-rs program, or a manually advanced queue.
//! - [`controller`]: the countdown state machine. Start/stop and visibility
//!   decide whether it runs; it keeps one tick scheduled while running and
//!   fires tick and completion listeners.
//! - [`timer`]: a bubbletea-rs component built on the controller.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use countdown_chronometer::prelude::*;
//!
//! let scheduler = ManualScheduler::new(ManualClock::new(0));
//! let events = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&events);
//!
//! let countdown = CountdownController::with_options(
//!     scheduler.clock().clone(),
//!     scheduler.clone(),
//!     &[
//!         with_base(3_000),
//!         with_on_complete(move |c| log.lock().unwrap().push(c.text())),
//!     ],
//! );
//! countdown.start();
//! assert_eq!(countdown.text(), "03");
//!
//! scheduler.advance(Duration::from_secs(3));
//! assert_eq!(*events.lock().unwrap(), vec!["00".to_string()]);
//! ```
//!
//! ## Formats
//!
//! ```rust
//! use countdown_chronometer::prelude::*;
//!
//! let countdown = CountdownController::with_options(
//!     ManualClock::new(0),
//!     ManualScheduler::new(ManualClock::new(0)),
//!     &[
//!         with_base(90_061_000),
//!         with_custom_chrono_format("%1$02dd %2$02dh %3$02dm %4$02ds"),
//!         with_format("Time left: %s"),
//!     ],
//! );
//! assert_eq!(countdown.text(), "Time left: 01d 01h 01m 01s");
//! ```

pub mod clock;
pub mod controller;
pub mod format;
pub mod scheduler;
pub mod template;
pub mod timer;

/// Convenience re-exports of the types most programs need.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::controller::{
        listener, with_base, with_custom_chrono_format, with_format, with_interval,
        with_on_complete, with_on_tick, with_template_engine, with_text_sink, with_visible,
        CountdownController, CountdownOption, CountdownPhase, Listener, TextSink,
    };
    pub use crate::format::{FastFormat, FormatError, FormatSpec};
    pub use crate::scheduler::{
        CmdScheduler, ManualScheduler, ScheduledMsg, Scheduler, TaskHandle, TokioScheduler,
    };
    pub use crate::template::{Arg, PrintfEngine, TemplateEngine, TemplateError};
    pub use crate::timer::{
        new as countdown_new, new_with_options as countdown_new_with_options, now_millis,
        Model as Countdown, StartStopMsg as CountdownStartStopMsg,
        TickMsg as CountdownTickMsg, TimeoutMsg as CountdownTimeoutMsg,
    };
}
