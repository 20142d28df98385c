//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Results go to stdout, diagnostics to stderr. Output respects the quiet
//! flag. When `--json` is enabled, results are a single pretty-printed JSON
//! document and nothing else is written to stdout.

use std::fmt::Display;

use serde::Serialize;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Where command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub verbosity: Verbosity,
    pub json: bool,
}

impl Output {
    pub fn new(verbosity: Verbosity, json: bool) -> Self {
        Self { verbosity, json }
    }

    /// Render a result: JSON when requested, else the text lines.
    pub fn emit<T, I, L>(&self, value: &T, lines: I) -> serde_json::Result<()>
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = L>,
        L: Display,
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines {
                print(line, self.verbosity);
            }
        }
        Ok(())
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format a line number, blank when absent.
pub fn format_line_number(number: i64) -> String {
    if number < 0 {
        String::new()
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn absent_line_numbers_are_blank() {
        assert_eq!(format_line_number(-1), "");
        assert_eq!(format_line_number(12), "12");
    }
}
