//! Error-driven severity escalation.
//!
//! A logger built with [`Logger::err_level`] carries a severity *floor*. The
//! floor only applies when the record being emitted carries an error, which
//! makes it possible to log the outcome of an operation at `debug` when it
//! succeeds and at `error` when it fails, with a single statement.
//!
//! ```rust
//! use fieldscope::{Level, Logger, LogError, SharedBuffer};
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder().writer(buffer.clone()).level(Level::Trace).build();
//!
//! logger.with_error(LogError::msg("fail")).err_level(Level::Error).debug("query");
//! logger.err_level(Level::Error).debug("query");
//!
//! let lines = buffer.lines();
//! assert!(lines[0].contains("level=error"));
//! assert!(lines[1].contains("level=debug"));
//! ```
//!
//! [`Logger::err_level`]: crate::Logger::err_level

use crate::{
    level::Level,
    value::{ERROR_KEY, Fields, Value},
};

/// Returns `true` if `fields` carries a (non-nil) error.
pub fn has_error(fields: &Fields) -> bool {
    matches!(fields.get(ERROR_KEY), Some(Value::Error(_)))
}

/// Computes the level a record is emitted at.
///
/// With an error present and a floor more severe than `requested`, the floor
/// wins. In every other case the requested level is kept; the floor never
/// makes a record less severe.
pub fn effective_level(requested: Level, floor: Option<Level>, fields: &Fields) -> Level {
    match floor {
        Some(floor) if floor < requested && has_error(fields) => floor,
        _ => requested,
    }
}

/// Applies a scope ceiling: the emitted level is never more verbose than the
/// ceiling.
pub fn clamp_to_ceiling(requested: Level, ceiling: Option<Level>) -> Level {
    match ceiling {
        Some(ceiling) => requested.min(ceiling),
        None => requested,
    }
}
