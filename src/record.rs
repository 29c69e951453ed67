//! The record handed to hooks, formatters and sinks.

use chrono::{DateTime, Utc};

use crate::{
    level::Level,
    value::{ERROR_KEY, Fields, LogError},
};

/// A fully materialized log record, as seen by hooks, formatters and sinks.
///
/// Deferred fields have already been resolved and escalation has already
/// been applied when a `Record` is constructed.
#[derive(Clone, Debug)]
pub struct Record {
    /// The level the record is emitted at.
    pub level: Level,
    /// The message.
    pub message: String,
    /// The structured fields, in insertion order.
    pub fields: Fields,
    /// When the record was created, or the time set with
    /// [`Logger::with_time`](crate::Logger::with_time).
    pub time: DateTime<Utc>,
}

impl Record {
    /// Returns the error carried by the record, if any.
    pub fn error(&self) -> Option<&LogError> {
        self.fields.get(ERROR_KEY).and_then(|value| value.as_error())
    }
}
