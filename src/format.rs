//! Remaining-time rendering.
//!
//! Turns a number of remaining seconds into display text. Without any
//! configuration the fast path picks a layout from the magnitude of the value:
//!
//! | Magnitude       | Layout       | Example               |
//! |-----------------|--------------|-----------------------|
//! | seconds only    | `SS`         | 5s → `05`             |
//! | minutes present | `MM:SS`      | 65s → `01:05`         |
//! | hours present   | `H:MM:SS`    | 3661s → `1:01:01`     |
//! | days present    | `D:HH:MM:SS` | 90000s → `1:01:00:00` |
//!
//! A [`FormatSpec`] can replace the fast path with a custom inner template
//! (receiving days, hours, minutes and seconds, in that order) and wrap the
//! result in an outer template with a single `%s` placeholder.
//!
//! # Examples
//!
//! ```rust
//! use countdown_chronometer::format::{render, FormatSpec};
//! use countdown_chronometer::template::PrintfEngine;
//!
//! let plain = render(3661, &FormatSpec::default(), &PrintfEngine);
//! assert_eq!(plain.text, "1:01:01");
//!
//! let spec = FormatSpec::default().with_outer_template("Time left: %s");
//! assert_eq!(render(65, &spec, &PrintfEngine).text, "Time left: 01:05");
//! ```

use crate::template::{Arg, TemplateEngine, TemplateError};

/// Seconds in a day.
pub const SECONDS_PER_DAY: u64 = 86_400;
/// Seconds in an hour.
pub const SECONDS_PER_HOUR: u64 = 3_600;
/// Seconds in a minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

const TIME_SEPARATOR: char = ':';
const TIME_PADDING: char = '0';

/// Remaining time split into fixed-ratio units.
///
/// The most significant non-zero unit is unbounded; every unit below it stays
/// within its natural range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decomposed {
    /// Whole days.
    pub days: u64,
    /// Hours, `0..24`.
    pub hours: u64,
    /// Minutes, `0..60`.
    pub minutes: u64,
    /// Seconds, `0..60`.
    pub seconds: u64,
}

impl Decomposed {
    /// Greedily splits `total` seconds, largest unit first.
    pub fn from_seconds(total: u64) -> Self {
        let mut rest = total;
        let days = rest / SECONDS_PER_DAY;
        rest -= days * SECONDS_PER_DAY;
        let hours = rest / SECONDS_PER_HOUR;
        rest -= hours * SECONDS_PER_HOUR;
        let minutes = rest / SECONDS_PER_MINUTE;
        rest -= minutes * SECONDS_PER_MINUTE;

        Self {
            days,
            hours,
            minutes,
            seconds: rest,
        }
    }

    /// Reassembles the total number of seconds.
    pub fn total_seconds(&self) -> u64 {
        self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }
}

/// The built-in layouts, selected automatically by magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastFormat {
    /// `D:HH:MM:SS`
    DaysHoursMinutesSeconds,
    /// `H:MM:SS`
    HoursMinutesSeconds,
    /// `MM:SS`
    MinutesSeconds,
    /// `SS`
    Seconds,
}

impl FastFormat {
    /// Picks the layout for a decomposed value.
    pub fn select(parts: &Decomposed) -> Self {
        if parts.days > 0 {
            FastFormat::DaysHoursMinutesSeconds
        } else if parts.hours > 0 {
            FastFormat::HoursMinutesSeconds
        } else if parts.minutes > 0 {
            FastFormat::MinutesSeconds
        } else {
            FastFormat::Seconds
        }
    }
}

/// Formatting configuration for a countdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSpec {
    /// Template with a single placeholder for the rendered time, e.g. `"Time left: %s"`.
    pub outer_template: Option<String>,
    /// Template with four positional placeholders: days, hours, minutes, seconds.
    pub custom_inner_template: Option<String>,
}

impl FormatSpec {
    /// Returns a copy with the outer template set.
    pub fn with_outer_template(mut self, template: impl Into<String>) -> Self {
        self.outer_template = Some(template.into());
        self
    }

    /// Returns a copy with the custom inner template set.
    pub fn with_custom_inner_template(mut self, template: impl Into<String>) -> Self {
        self.custom_inner_template = Some(template.into());
        self
    }
}

/// Which template failed to render.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The custom inner template was rejected; the fast path was used instead.
    #[error("illegal custom chrono format \"{template}\": {source}")]
    Inner {
        /// The rejected template.
        template: String,
        /// What the engine reported.
        source: TemplateError,
    },
    /// The outer template was rejected; the inner text was used verbatim.
    #[error("illegal format string \"{template}\": {source}")]
    Outer {
        /// The rejected template.
        template: String,
        /// What the engine reported.
        source: TemplateError,
    },
}

impl FormatError {
    /// The template that failed.
    pub fn template(&self) -> &str {
        match self {
            FormatError::Inner { template, .. } | FormatError::Outer { template, .. } => template,
        }
    }
}

/// Result of [`render`]: always some text, plus the first failure if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Text to display.
    pub text: String,
    /// Set when a template failed and the text is a fallback.
    pub error: Option<FormatError>,
}

/// Whole seconds from `now_millis` until `base_millis`, clamped at zero.
///
/// Sub-second remainders are truncated, so a countdown shows `00` for the
/// final partial second.
pub fn remaining_seconds(base_millis: i64, now_millis: i64) -> u64 {
    let millis = base_millis.saturating_sub(now_millis);
    u64::try_from(millis / 1000).unwrap_or(0)
}

/// Renders the fast-path layout into `buf`, replacing its contents.
///
/// Reusing one buffer across ticks avoids an allocation per second.
pub fn render_fast(buf: &mut String, parts: &Decomposed) {
    buf.clear();
    match FastFormat::select(parts) {
        FastFormat::DaysHoursMinutesSeconds => {
            push_unpadded(buf, parts.days);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.hours);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.minutes);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.seconds);
        }
        FastFormat::HoursMinutesSeconds => {
            push_unpadded(buf, parts.hours);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.minutes);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.seconds);
        }
        FastFormat::MinutesSeconds => {
            push_two_digits(buf, parts.minutes);
            buf.push(TIME_SEPARATOR);
            push_two_digits(buf, parts.seconds);
        }
        FastFormat::Seconds => push_two_digits(buf, parts.seconds),
    }
}

/// Renders `remaining_seconds` according to `spec`.
///
/// Never fails: a rejected custom inner template falls back to the fast path
/// and a rejected outer template falls back to the inner text. The first
/// failure is reported in [`Rendered::error`].
pub fn render(remaining_seconds: u64, spec: &FormatSpec, engine: &dyn TemplateEngine) -> Rendered {
    let mut buf = String::with_capacity(8);
    render_into(&mut buf, remaining_seconds, spec, engine)
}

/// Like [`render`], but uses `buf` as scratch space for the fast path.
pub fn render_into(
    buf: &mut String,
    remaining_seconds: u64,
    spec: &FormatSpec,
    engine: &dyn TemplateEngine,
) -> Rendered {
    let parts = Decomposed::from_seconds(remaining_seconds);
    let mut error = None;

    let inner = match spec.custom_inner_template.as_deref() {
        Some(template) => match render_custom(template, &parts, engine) {
            Ok(text) => text,
            Err(source) => {
                error = Some(FormatError::Inner {
                    template: template.to_string(),
                    source,
                });
                render_fast(buf, &parts);
                buf.clone()
            }
        },
        None => {
            render_fast(buf, &parts);
            buf.clone()
        }
    };

    let text = match spec.outer_template.as_deref() {
        Some(template) => match engine.format(template, &[Arg::Str(&inner)]) {
            Ok(text) => text,
            Err(source) => {
                error.get_or_insert(FormatError::Outer {
                    template: template.to_string(),
                    source,
                });
                inner
            }
        },
        None => inner,
    };

    Rendered { text, error }
}

fn render_custom(
    template: &str,
    parts: &Decomposed,
    engine: &dyn TemplateEngine,
) -> Result<String, TemplateError> {
    engine.format(
        template,
        &[
            Arg::from(parts.days),
            Arg::from(parts.hours),
            Arg::from(parts.minutes),
            Arg::from(parts.seconds),
        ],
    )
}

fn push_unpadded(buf: &mut String, value: u64) {
    buf.push_str(&value.to_string());
}

fn push_two_digits(buf: &mut String, value: u64) {
    if value < 10 {
        buf.push(TIME_PADDING);
    } else {
        buf.push(to_digit_char(value / 10 % 10));
    }
    buf.push(to_digit_char(value % 10));
}

fn to_digit_char(digit: u64) -> char {
    char::from_digit(digit as u32, 10).unwrap_or(TIME_PADDING)
}
