//! Positional string templates.
//!
//! Custom chrono formats and outer display formats are plain strings with
//! printf-style placeholders such as `%s`, `%02d` or `%3$02d`. Rendering them
//! is delegated to a [`TemplateEngine`] so hosts can swap in their own
//! formatting rules; [`PrintfEngine`] is the default and understands the
//! subset of printf syntax the countdown needs.
//!
//! # Supported syntax
//!
//! ```text
//! %[index$][flags][width]conversion
//! ```
//!
//! - `index$`: 1-based explicit argument index. Specifiers without an index
//!   consume arguments in order, independently of indexed ones.
//! - flags: `-` (left-justify, needs a width) and `0` (zero-pad, numeric only).
//! - conversions: `d`, `x`, `X`, `o` (integers), `s`, `S` (any argument),
//!   `%` (a literal percent sign) and `n` (a line break).
//!
//! # Examples
//!
//! ```rust
//! use countdown_chronometer::template::{Arg, PrintfEngine, TemplateEngine};
//!
//! let engine = PrintfEngine;
//! let text = engine
//!     .format("%1$02d days, %2$02d hours", &[Arg::Int(3), Arg::Int(7)])
//!     .unwrap();
//! assert_eq!(text, "03 days, 07 hours");
//!
//! assert!(engine.format("%q", &[]).is_err());
//! ```

use std::fmt::Write as _;

/// A single positional argument handed to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    /// An integer value, accepted by every conversion.
    Int(i64),
    /// A string value, accepted by `%s` and `%S` only.
    Str(&'a str),
}

impl Arg<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Arg::Int(_) => "an integer",
            Arg::Str(_) => "a string",
        }
    }
}

impl From<i64> for Arg<'_> {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<u64> for Arg<'_> {
    fn from(value: u64) -> Self {
        Arg::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(value)
    }
}

/// Largest field width a specifier may ask for.
pub const MAX_WIDTH: usize = 1024;

/// Why a template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The conversion character is not one the engine understands.
    #[error("unknown conversion '{conversion}' at byte {position}")]
    UnknownConversion {
        /// The offending conversion character.
        conversion: char,
        /// Byte offset of the `%` that starts the specifier.
        position: usize,
    },

    /// A specifier refers to an argument that was not supplied.
    #[error("specifier at byte {position} needs argument {index} but only {available} supplied")]
    MissingArgument {
        /// 1-based index of the missing argument.
        index: usize,
        /// Number of arguments actually supplied.
        available: usize,
        /// Byte offset of the `%` that starts the specifier.
        position: usize,
    },

    /// The argument type does not fit the conversion (e.g. `%d` with a string).
    #[error("conversion '{conversion}' cannot format {found}")]
    IllegalConversion {
        /// The conversion character.
        conversion: char,
        /// Description of the argument that was supplied.
        found: &'static str,
    },

    /// The template ends in the middle of a specifier.
    #[error("unterminated format specifier at byte {position}")]
    UnterminatedSpecifier {
        /// Byte offset of the `%` that starts the specifier.
        position: usize,
    },

    /// An explicit argument index of zero was used.
    #[error("argument index 0 at byte {position}, indices start at 1")]
    ZeroIndex {
        /// Byte offset of the `%` that starts the specifier.
        position: usize,
    },

    /// The field width is larger than [`MAX_WIDTH`] or does not fit in a `usize`.
    #[error("field width {width} at byte {position} exceeds the maximum of {max}", max = MAX_WIDTH)]
    IllegalWidth {
        /// The width as written in the template.
        width: String,
        /// Byte offset of the `%` that starts the specifier.
        position: usize,
    },

    /// The flags are contradictory or do not apply to the conversion.
    #[error("illegal flags \"{flags}\" for conversion '{conversion}'")]
    IllegalFlags {
        /// The flags as written in the template.
        flags: String,
        /// The conversion character.
        conversion: char,
    },
}

/// Renders a template against positional arguments.
///
/// Implementations must never panic on bad input; every problem is reported
/// through [`TemplateError`] so callers can fall back to an unformatted value.
pub trait TemplateEngine: Send + Sync {
    /// Renders `template`, substituting `args` into its placeholders.
    fn format(&self, template: &str, args: &[Arg<'_>]) -> Result<String, TemplateError>;
}

/// The default printf-style engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintfEngine;

#[derive(Debug, Default)]
struct Spec {
    index: Option<usize>,
    left_justify: bool,
    zero_pad: bool,
    width: Option<usize>,
    conversion: char,
    flags: String,
}

impl TemplateEngine for PrintfEngine {
    fn format(&self, template: &str, args: &[Arg<'_>]) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len() + 8);
        let mut chars = template.char_indices().peekable();
        let mut ordinary = 0usize;

        while let Some((position, c)) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            let spec = parse_spec(&mut chars, position)?;
            match spec.conversion {
                '%' => pad_into(&mut out, "%", &spec),
                'n' => out.push('\n'),
                'd' | 'x' | 'X' | 'o' | 's' | 'S' => {
                    let index = match spec.index {
                        Some(index) => index,
                        None => {
                            ordinary += 1;
                            ordinary
                        }
                    };
                    let arg = args.get(index - 1).ok_or(TemplateError::MissingArgument {
                        index,
                        available: args.len(),
                        position,
                    })?;
                    convert_into(&mut out, *arg, &spec)?;
                }
                other => {
                    return Err(TemplateError::UnknownConversion {
                        conversion: other,
                        position,
                    })
                }
            }
        }

        Ok(out)
    }
}

fn parse_spec(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    position: usize,
) -> Result<Spec, TemplateError> {
    let mut spec = Spec::default();

    // A leading run of digits is an argument index only when followed by '$'.
    let mut lookahead = chars.clone();
    let mut digits = String::new();
    while let Some(&(_, d)) = lookahead.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        lookahead.next();
    }
    if !digits.is_empty() && matches!(lookahead.peek(), Some(&(_, '$'))) {
        lookahead.next();
        let index = digits.parse::<usize>().unwrap_or(usize::MAX);
        if index == 0 {
            return Err(TemplateError::ZeroIndex { position });
        }
        spec.index = Some(index);
        *chars = lookahead;
    }

    while let Some(&(_, f)) = chars.peek() {
        match f {
            '-' => spec.left_justify = true,
            '0' => spec.zero_pad = true,
            _ => break,
        }
        spec.flags.push(f);
        chars.next();
    }

    let mut width = String::new();
    while let Some(&(_, d)) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        width.push(d);
        chars.next();
    }
    if !width.is_empty() {
        match width.parse::<usize>() {
            Ok(w) if w <= MAX_WIDTH => spec.width = Some(w),
            _ => return Err(TemplateError::IllegalWidth { width, position }),
        }
    }

    let (_, conversion) = chars
        .next()
        .ok_or(TemplateError::UnterminatedSpecifier { position })?;
    spec.conversion = conversion;

    let numeric = matches!(conversion, 'd' | 'x' | 'X' | 'o');
    let contradictory = spec.left_justify && spec.zero_pad;
    let needs_width = (spec.left_justify || spec.zero_pad) && spec.width.is_none();
    let zero_on_text = spec.zero_pad && !numeric;
    if contradictory || needs_width || zero_on_text {
        return Err(TemplateError::IllegalFlags {
            flags: spec.flags.clone(),
            conversion,
        });
    }

    Ok(spec)
}

fn convert_into(out: &mut String, arg: Arg<'_>, spec: &Spec) -> Result<(), TemplateError> {
    let text = match (spec.conversion, arg) {
        ('d', Arg::Int(v)) => v.to_string(),
        ('x', Arg::Int(v)) => format!("{:x}", v),
        ('X', Arg::Int(v)) => format!("{:X}", v),
        ('o', Arg::Int(v)) => format!("{:o}", v),
        ('s', Arg::Int(v)) => v.to_string(),
        ('S', Arg::Int(v)) => v.to_string(),
        ('s', Arg::Str(s)) => s.to_string(),
        ('S', Arg::Str(s)) => s.to_uppercase(),
        (conversion, other) => {
            return Err(TemplateError::IllegalConversion {
                conversion,
                found: other.kind(),
            })
        }
    };
    pad_into(out, &text, spec);
    Ok(())
}

fn pad_into(out: &mut String, text: &str, spec: &Spec) {
    let len = text.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    if fill == 0 {
        out.push_str(text);
        return;
    }

    if spec.left_justify {
        out.push_str(text);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if spec.zero_pad {
        // The sign goes before the zeros: "-0005", not "000-5".
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text),
        };
        let _ = write!(out, "{sign}{}{digits}", "0".repeat(fill));
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(template: &str, args: &[Arg<'_>]) -> Result<String, TemplateError> {
        PrintfEngine.format(template, args)
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(fmt("no placeholders", &[]).unwrap(), "no placeholders");
        assert_eq!(fmt("", &[]).unwrap(), "");
    }

    #[test]
    fn test_string_substitution() {
        assert_eq!(
            fmt("Formatted time (%s)", &[Arg::Str("01:05")]).unwrap(),
            "Formatted time (01:05)"
        );
        assert_eq!(fmt("%S!", &[Arg::Str("go")]).unwrap(), "GO!");
    }

    #[test]
    fn test_positional_integers() {
        let args = [Arg::Int(1), Arg::Int(2), Arg::Int(3), Arg::Int(4)];
        assert_eq!(
            fmt(
                "%1$02d days, %2$02d hours, %3$02d minutes and %4$02d seconds remaining",
                &args
            )
            .unwrap(),
            "01 days, 02 hours, 03 minutes and 04 seconds remaining"
        );
        // Indices may be reused and reordered.
        assert_eq!(fmt("%4$d-%1$d-%4$d", &args).unwrap(), "4-1-4");
    }

    #[test]
    fn test_ordinary_index_is_independent_of_explicit() {
        let args = [Arg::Int(10), Arg::Int(20)];
        assert_eq!(fmt("%2$d %d %d", &args).unwrap(), "20 10 20");
    }

    #[test]
    fn test_width_and_justification() {
        assert_eq!(fmt("[%5d]", &[Arg::Int(42)]).unwrap(), "[   42]");
        assert_eq!(fmt("[%-5d]", &[Arg::Int(42)]).unwrap(), "[42   ]");
        assert_eq!(fmt("[%05d]", &[Arg::Int(-42)]).unwrap(), "[-0042]");
        assert_eq!(fmt("[%4s]", &[Arg::Str("ab")]).unwrap(), "[  ab]");
        assert_eq!(fmt("[%1d]", &[Arg::Int(123)]).unwrap(), "[123]");
    }

    #[test]
    fn test_radix_conversions() {
        assert_eq!(fmt("%x %X %o", &[Arg::Int(255), Arg::Int(255), Arg::Int(8)]).unwrap(), "ff FF 10");
    }

    #[test]
    fn test_literal_percent_and_newline() {
        assert_eq!(fmt("100%% done%n", &[]).unwrap(), "100% done\n");
    }

    #[test]
    fn test_integer_as_string() {
        assert_eq!(fmt("%s", &[Arg::Int(7)]).unwrap(), "7");
    }

    #[test]
    fn test_unknown_conversion() {
        assert_eq!(
            fmt("abc %q", &[Arg::Int(1)]),
            Err(TemplateError::UnknownConversion {
                conversion: 'q',
                position: 4
            })
        );
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(
            fmt("%s and %s", &[Arg::Str("one")]),
            Err(TemplateError::MissingArgument {
                index: 2,
                available: 1,
                position: 7
            })
        );
        assert!(matches!(
            fmt("%5$d", &[Arg::Int(1)]),
            Err(TemplateError::MissingArgument { index: 5, .. })
        ));
    }

    #[test]
    fn test_illegal_conversion() {
        assert_eq!(
            fmt("%d", &[Arg::Str("x")]),
            Err(TemplateError::IllegalConversion {
                conversion: 'd',
                found: "a string"
            })
        );
    }

    #[test]
    fn test_unterminated_specifier() {
        assert_eq!(
            fmt("Time left: %", &[Arg::Str("x")]),
            Err(TemplateError::UnterminatedSpecifier { position: 11 })
        );
        assert!(fmt("%1$", &[Arg::Int(1)]).is_err());
    }

    #[test]
    fn test_zero_index() {
        assert_eq!(
            fmt("%0$d", &[Arg::Int(1)]),
            Err(TemplateError::ZeroIndex { position: 0 })
        );
    }

    #[test]
    fn test_illegal_flags() {
        assert!(matches!(
            fmt("%-05d", &[Arg::Int(1)]),
            Err(TemplateError::IllegalFlags { .. })
        ));
        assert!(matches!(
            fmt("%-d", &[Arg::Int(1)]),
            Err(TemplateError::IllegalFlags { .. })
        ));
        assert!(matches!(
            fmt("%05s", &[Arg::Str("a")]),
            Err(TemplateError::IllegalFlags { .. })
        ));
    }

    #[test]
    fn test_oversized_width_is_an_error() {
        assert_eq!(
            fmt("%099999999999999999999d", &[Arg::Int(5)]),
            Err(TemplateError::IllegalWidth {
                width: "99999999999999999999".to_string(),
                position: 0
            })
        );
        assert!(matches!(
            fmt("x %2000s", &[Arg::Str("a")]),
            Err(TemplateError::IllegalWidth { position: 2, .. })
        ));
        assert_eq!(
            fmt("%1024d", &[Arg::Int(1)]).unwrap().len(),
            MAX_WIDTH
        );
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = fmt("%q", &[]).unwrap_err();
        assert_eq!(err.to_string(), "unknown conversion 'q' at byte 0");
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(Arg::from(5i64), Arg::Int(5));
        assert_eq!(Arg::from(5u64), Arg::Int(5));
        assert_eq!(Arg::from(u64::MAX), Arg::Int(i64::MAX));
        assert_eq!(Arg::from("x"), Arg::Str("x"));
    }
}
