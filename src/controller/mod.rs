//! Countdown controller.
//!
//! The controller owns the countdown state (target instant, `started` and
//! `visible` flags, the derived `running` flag), keeps exactly one tick
//! scheduled while running, renders the remaining time through
//! [`format`](crate::format) and notifies the tick and completion listeners.
//!
//! It knows nothing about windows or widgets: hosts feed it two booleans
//! (`started` via [`CountdownController::start`]/[`CountdownController::stop`],
//! `visible` via [`CountdownController::set_visible`]) and read its text
//! through a [`TextSink`] or [`CountdownController::text`].

pub mod model;
pub mod types;


// Re-export main types and functions for public API
pub use model::{CountdownController, TICK_INTERVAL};
pub use types::{
    listener, with_base, with_custom_chrono_format, with_format, with_interval, with_on_complete,
    with_on_tick, with_template_engine, with_text_sink, with_visible, CountdownOption,
    CountdownPhase, Listener, TextSink,
};
