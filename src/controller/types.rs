//! Types shared by the countdown controller and its hosts.

use std::sync::Arc;
use std::time::Duration;

use super::model::CountdownController;
use crate::template::TemplateEngine;

/// Callback notified on ticks or on completion.
///
/// Listeners run after the controller has released its internal lock, so they
/// are free to call back into the controller (for example to push the base
/// forward from a completion listener).
pub type Listener = Arc<dyn Fn(&CountdownController) + Send + Sync>;

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&CountdownController) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Receives every string the controller renders.
///
/// This is the controller's output boundary: a label, a terminal line, a
/// status bar. Closures taking `&str` implement it directly.
pub trait TextSink: Send + Sync {
    /// Shows `text`.
    fn set_text(&self, text: &str);
}

impl<F> TextSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn set_text(&self, text: &str) {
        self(text)
    }
}

/// Where a countdown is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// Not started, or not visible.
    Stopped,
    /// Started, visible, and time remains; a tick is scheduled.
    Running,
    /// Started and visible, but the target instant has passed.
    Completed,
}

/// Construction-time options for [`CountdownController`].
#[derive(Clone)]
pub enum CountdownOption {
    /// Target instant in milliseconds since the epoch.
    WithBase(i64),
    /// Outer format string with one `%s` placeholder.
    WithFormat(String),
    /// Custom chrono format with four positional placeholders.
    WithCustomChronoFormat(String),
    /// Initial visibility. Defaults to visible.
    WithVisible(bool),
    /// Tick cadence. Defaults to one second; zero is replaced by the default.
    WithInterval(Duration),
    /// Where rendered text goes.
    WithTextSink(Arc<dyn TextSink>),
    /// Template engine for custom and outer formats.
    WithTemplateEngine(Arc<dyn TemplateEngine>),
    /// Tick listener.
    WithOnTick(Listener),
    /// Completion listener.
    WithOnComplete(Listener),
}

impl std::fmt::Debug for CountdownOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountdownOption::WithBase(base) => f.debug_tuple("WithBase").field(base).finish(),
            CountdownOption::WithFormat(s) => f.debug_tuple("WithFormat").field(s).finish(),
            CountdownOption::WithCustomChronoFormat(s) => {
                f.debug_tuple("WithCustomChronoFormat").field(s).finish()
            }
            CountdownOption::WithVisible(v) => f.debug_tuple("WithVisible").field(v).finish(),
            CountdownOption::WithInterval(d) => f.debug_tuple("WithInterval").field(d).finish(),
            CountdownOption::WithTextSink(_) => f.write_str("WithTextSink(..)"),
            CountdownOption::WithTemplateEngine(_) => f.write_str("WithTemplateEngine(..)"),
            CountdownOption::WithOnTick(_) => f.write_str("WithOnTick(..)"),
            CountdownOption::WithOnComplete(_) => f.write_str("WithOnComplete(..)"),
        }
    }
}

/// Sets the target instant.
pub fn with_base(base: i64) -> CountdownOption {
    CountdownOption::WithBase(base)
}

/// Sets the outer format string.
pub fn with_format(format: impl Into<String>) -> CountdownOption {
    CountdownOption::WithFormat(format.into())
}

/// Sets the custom chrono format.
pub fn with_custom_chrono_format(format: impl Into<String>) -> CountdownOption {
    CountdownOption::WithCustomChronoFormat(format.into())
}

/// Sets the initial visibility.
pub fn with_visible(visible: bool) -> CountdownOption {
    CountdownOption::WithVisible(visible)
}

/// Sets the tick cadence.
///
/// A zero interval is ignored with a warning and the one-second default is
/// used instead.
pub fn with_interval(interval: Duration) -> CountdownOption {
    CountdownOption::WithInterval(interval)
}

/// Sets the text sink.
pub fn with_text_sink(sink: impl TextSink + 'static) -> CountdownOption {
    CountdownOption::WithTextSink(Arc::new(sink))
}

/// Sets the template engine.
pub fn with_template_engine(engine: impl TemplateEngine + 'static) -> CountdownOption {
    CountdownOption::WithTemplateEngine(Arc::new(engine))
}

/// Sets the tick listener.
pub fn with_on_tick<F>(f: F) -> CountdownOption
where
    F: Fn(&CountdownController) + Send + Sync + 'static,
{
    CountdownOption::WithOnTick(listener(f))
}

/// Sets the completion listener.
pub fn with_on_complete<F>(f: F) -> CountdownOption
where
    F: Fn(&CountdownController) + Send + Sync + 'static,
{
    CountdownOption::WithOnComplete(listener(f))
}
