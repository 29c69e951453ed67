//! Severity levels.
//!
//! Levels are ordered by severity ordinal: [`Level::Panic`] is the most
//! severe and the *smallest* value, [`Level::Trace`] the most verbose and the
//! largest. Comparisons therefore read as "more verbose than":
//!
//! ```rust
//! use fieldscope::Level;
//!
//! assert!(Level::Debug > Level::Info);
//! assert!(Level::Error < Level::Warn);
//! assert_eq!(Level::Debug.min(Level::Info), Level::Info);
//! ```

use std::{fmt, str::FromStr};

/// Severity of a log record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// The process cannot continue in its current state.
    Panic = 0,
    /// A fatal condition for the current operation or process.
    Fatal,
    /// An error that must be looked at.
    Error,
    /// Something unexpected that is not an error yet.
    Warn,
    /// General operational information.
    Info,
    /// Verbose information useful when debugging.
    Debug,
    /// Very fine-grained tracing.
    Trace,
}

impl Level {
    /// Every level, from the most to the least severe.
    pub const ALL: [Level; 7] = [
        Level::Panic,
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    /// The lowercase name used by the text and JSON formatters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Panic => "panic",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }

    /// Returns `true` when a record at `self` passes a `threshold`.
    #[inline]
    pub fn is_enabled_for(self, threshold: Level) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid log level: {:?}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Level::Panic,
            "fatal" => Level::Fatal,
            "error" => Level::Error,
            "warn" | "warning" => Level::Warn,
            "info" => Level::Info,
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            _ => return Err(ParseLevelError(s.to_owned())),
        };
        Ok(level)
    }
}
