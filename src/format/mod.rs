//! Record formatters.
//!
//! - **[`TextFormatter`]**: `key=value` lines, the default.
//! - **[`JsonFormatter`]** (requires the `json` feature): one JSON object per
//!   line.

#[cfg(feature = "json")]
mod json;
mod text;

use std::fmt;

#[cfg(feature = "json")]
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;
use crate::record::Record;

/// Names reserved for the fixed part of a formatted record. Fields using one
/// of these keys are emitted as `fields.<key>` instead.
pub(crate) const RESERVED_KEYS: [&str; 3] = ["time", "level", "msg"];

pub(crate) fn field_key(key: &str) -> std::borrow::Cow<'_, str> {
    if RESERVED_KEYS.contains(&key) {
        std::borrow::Cow::Owned(format!("fields.{key}"))
    } else {
        std::borrow::Cow::Borrowed(key)
    }
}

/// Turns a [`Record`] into a line of output.
pub trait Formatter: 'static + Send + Sync {
    /// Appends the formatted record, including the trailing newline, to
    /// `out`.
    fn format(&self, record: &Record, out: &mut String) -> fmt::Result;
}
