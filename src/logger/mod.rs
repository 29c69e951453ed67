//! The base logger.
//!
//! A [`Logger`] is an immutable, cheaply cloneable value. Every `with_*`
//! method returns a new logger that shares the output configuration and
//! copies the field map on write; terminating methods such as
//! [`Logger::info`] build a [`Record`] and write it.
//!
//! Emitting a record goes through these steps:
//!
//! 1. deferred fields are resolved and merged into the fields,
//! 2. the level is escalated to the [error floor](Logger::err_level) if the
//!    record carries an error,
//! 3. records more verbose than the logger's threshold are dropped,
//! 4. hooks registered for the level run,
//! 5. the formatter renders the record and the sink writes it.
//!
//! Failures in the last two steps are reported as `tracing` warnings; a
//! logging call never returns an error and never panics.

mod builder;

use std::{
    fmt::{self, Write as _},
    io,
    mem,
};

use chrono::{DateTime, Utc};
use triomphe::Arc;

pub use self::builder::LoggerBuilder;
use crate::{
    deferred::Deferred,
    escalate,
    format::Formatter,
    hooks::LevelHooks,
    level::Level,
    macros::level_methods,
    record::Record,
    sink::Sink,
    value::{ERROR_KEY, Fields, LogError, Value},
};

pub(crate) struct LoggerCore {
    pub(crate) sink: Box<dyn Sink>,
    pub(crate) formatter: Box<dyn Formatter>,
    pub(crate) level: Level,
    pub(crate) hooks: LevelHooks,
}

/// A structured logger.
///
/// ```rust
/// use fieldscope::{Logger, SharedBuffer};
///
/// let buffer = SharedBuffer::new();
/// let logger = Logger::new(buffer.clone()).with_field("service", "billing");
///
/// logger.with_field("invoice", 17).info("created");
/// logger.debug("not written, the default threshold is info");
///
/// let lines = buffer.lines();
/// assert_eq!(lines.len(), 1);
/// assert!(lines[0].ends_with("level=info msg=created invoice=17 service=billing"));
/// ```
#[derive(Clone)]
pub struct Logger {
    /// `None` for the no-op logger.
    core: Option<Arc<LoggerCore>>,
    fields: Arc<Fields>,
    time: Option<DateTime<Utc>>,
    err_level: Option<Level>,
    deferred: Vec<(String, Deferred)>,
}

impl Logger {
    pub(crate) fn from_core(core: LoggerCore, fields: Fields) -> Self {
        Self {
            core: Some(Arc::new(core)),
            fields: Arc::new(fields),
            time: None,
            err_level: None,
            deferred: Vec::new(),
        }
    }

    /// Starts configuring a logger.
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// A logger writing text lines to `writer` at the [`Level::Info`]
    /// threshold.
    pub fn new<W: io::Write + Send + 'static>(writer: W) -> Self {
        Self::builder().writer(writer).build()
    }

    /// A logger that discards everything.
    ///
    /// Every method on the returned logger is a no-op, and deriving new
    /// loggers from it does not copy anything.
    pub fn noop() -> Self {
        Self {
            core: None,
            fields: Arc::new(Fields::new()),
            time: None,
            err_level: None,
            deferred: Vec::new(),
        }
    }

    /// Returns `true` for loggers created with [`Logger::noop`] or derived
    /// from one.
    pub fn is_noop(&self) -> bool {
        self.core.is_none()
    }

    /// The verbosity threshold, `None` for the no-op logger.
    pub fn threshold(&self) -> Option<Level> {
        self.core.as_ref().map(|core| core.level)
    }

    /// Returns `true` if a record requested at `level` could be written.
    ///
    /// This accounts for the [error floor](Self::err_level), which may make
    /// an otherwise filtered record pass.
    pub fn is_enabled(&self, level: Level) -> bool {
        self.enabled_core(level).is_some()
    }

    /// The fields accumulated so far, excluding deferred ones.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// The error attached with [`with_error`](Self::with_error), if any.
    pub fn attached_error(&self) -> Option<&LogError> {
        self.fields.get(ERROR_KEY).and_then(Value::as_error)
    }

    /// The escalation floor set with [`err_level`](Self::err_level).
    pub fn error_floor(&self) -> Option<Level> {
        self.err_level
    }

    /// Adds a field.
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut logger = self.clone();
        logger.insert_field(key.into(), value.into());
        logger
    }

    /// Adds several fields.
    pub fn with_fields<K, V, I>(&self, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut logger = self.clone();
        logger.extend_fields(fields);
        logger
    }

    /// Attaches an error under the `error` key.
    pub fn with_error(&self, err: impl Into<LogError>) -> Self {
        self.with_error_opt(Some(err.into()))
    }

    /// Attaches an error if there is one; `None` removes any error
    /// previously attached.
    pub fn with_error_opt(&self, err: Option<LogError>) -> Self {
        let mut logger = self.clone();
        logger.set_error(err);
        logger
    }

    /// Overrides the timestamp of the records emitted by the new logger.
    pub fn with_time(&self, time: DateTime<Utc>) -> Self {
        let mut logger = self.clone();
        logger.time = Some(time);
        logger
    }

    /// Registers a deferred field, read when the record is emitted.
    ///
    /// `cell` is usually a `&Slot<T>`; see [`Deferred`] for the other
    /// accepted forms and the module documentation of
    /// [`deferred`](crate::deferred) for the resolution rules.
    pub fn defer(&self, key: impl Into<String>, cell: impl Into<Deferred>) -> Self {
        let mut logger = self.clone();
        if !logger.is_noop() {
            logger.deferred.push((key.into(), cell.into()));
        }
        logger
    }

    /// Registers a deferred `error` field.
    ///
    /// ```rust
    /// use fieldscope::{ErrorSlot, Level, Logger, LogError, SharedBuffer};
    ///
    /// fn fetch(logger: &Logger, fail: bool) -> Result<(), LogError> {
    ///     let err = ErrorSlot::empty();
    ///     let _log = logger.defer_error(&err).on_drop(Level::Info, "fetch");
    ///     if fail {
    ///         return err.track(Err(LogError::msg("timeout")));
    ///     }
    ///     Ok(())
    /// }
    ///
    /// let buffer = SharedBuffer::new();
    /// let logger = Logger::new(buffer.clone());
    /// fetch(&logger, false).unwrap();
    /// fetch(&logger, true).unwrap_err();
    ///
    /// let lines = buffer.lines();
    /// assert!(!lines[0].contains("error="));
    /// assert!(lines[1].contains("error=timeout"));
    /// ```
    pub fn defer_error(&self, cell: impl Into<Deferred>) -> Self {
        self.defer(ERROR_KEY, cell)
    }

    /// Sets the level records are raised to when they carry an error.
    ///
    /// The floor only ever makes a record more severe. See
    /// [`escalate`](crate::escalate).
    pub fn err_level(&self, floor: Level) -> Self {
        let mut logger = self.clone();
        logger.err_level = Some(floor);
        logger
    }

    /// Calls `f` with this logger, unless it is a no-op logger.
    ///
    /// Useful together with the [triggers](crate::triggers) to skip building
    /// expensive fields.
    pub fn run(&self, f: impl FnOnce(&Logger)) {
        if !self.is_noop() {
            f(self);
        }
    }

    /// Returns a guard that emits `message` at `level` when dropped.
    ///
    /// Fields deferred on this logger are resolved at that point, so values
    /// assigned after this call, including on early returns, show up in the
    /// record.
    pub fn on_drop(self, level: Level, message: impl Into<String>) -> EmitOnDrop {
        EmitOnDrop {
            logger: self,
            level,
            message: message.into(),
            armed: true,
        }
    }

    /// Emits `message` at `level`.
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        if let Some(core) = self.enabled_core(level) {
            self.emit(core, level, message.to_string());
        }
    }

    /// Emits the output of `format_args!` at `level`.
    pub fn logf(&self, level: Level, args: fmt::Arguments<'_>) {
        self.log(level, args)
    }

    /// Emits `parts` separated by single spaces at `level`.
    pub fn logln(&self, level: Level, parts: &[&dyn fmt::Display]) {
        let Some(core) = self.enabled_core(level) else {
            return;
        };
        let mut message = String::new();
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                message.push(' ');
            }
            // writing into a String cannot fail
            let _ = write!(message, "{part}");
        }
        self.emit(core, level, message);
    }

    level_methods!();

    pub(crate) fn insert_field(&mut self, key: String, value: Value) {
        if !self.is_noop() {
            Arc::make_mut(&mut self.fields).insert(key, value);
        }
    }

    pub(crate) fn extend_fields<K, V, I>(&mut self, fields: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        if !self.is_noop() {
            Arc::make_mut(&mut self.fields)
                .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
    }

    pub(crate) fn set_error(&mut self, err: Option<LogError>) {
        if self.is_noop() {
            return;
        }
        let fields = Arc::make_mut(&mut self.fields);
        match err {
            Some(err) => {
                fields.insert(ERROR_KEY.to_owned(), Value::Error(err));
            }
            None => {
                fields.shift_remove(ERROR_KEY);
            }
        }
    }

    fn enabled_core(&self, level: Level) -> Option<&LoggerCore> {
        let core = self.core.as_deref()?;
        let most_severe = match self.err_level {
            Some(floor) => level.min(floor),
            None => level,
        };
        most_severe.is_enabled_for(core.level).then_some(core)
    }

    fn materialize(&self) -> Fields {
        let mut fields = Fields::clone(&self.fields);
        for (key, cell) in &self.deferred {
            if let Some(value) = cell.resolve() {
                fields.insert(key.clone(), value);
            }
        }
        fields
    }

    fn emit(&self, core: &LoggerCore, requested: Level, message: String) {
        let fields = self.materialize();
        let level = escalate::effective_level(requested, self.err_level, &fields);
        if !level.is_enabled_for(core.level) {
            return;
        }

        let mut record = Record {
            level,
            message,
            fields,
            time: self.time.unwrap_or_else(Utc::now),
        };
        core.hooks.fire(&mut record);

        let mut line = String::new();
        if let Err(error) = core.formatter.format(&record, &mut line) {
            tracing::warn!(%error, level = %record.level, "failed to format log record");
            return;
        }
        if let Err(error) = core.sink.write(&record, line.as_bytes()) {
            tracing::warn!(%error, level = %record.level, "failed to write log record");
        }
    }
}

impl Default for Logger {
    /// The process-wide default logger, see
    /// [`default_logger`](crate::default_logger).
    fn default() -> Self {
        crate::global::default_logger()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("threshold", &self.threshold())
            .field("fields", &self.fields)
            .field("err_level", &self.err_level)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

/// Emits a record when dropped.
///
/// Created by [`Logger::on_drop`]. The record is also emitted while
/// unwinding from a panic.
#[must_use = "the record is emitted when the guard is dropped"]
#[derive(Debug)]
pub struct EmitOnDrop {
    logger: Logger,
    level: Level,
    message: String,
    armed: bool,
}

impl EmitOnDrop {
    /// The logger the record will be emitted with.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Changes the level of the pending record.
    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    /// Drops the guard without emitting anything.
    pub fn cancel(mut self) {
        self.armed = false;
    }
}

impl Drop for EmitOnDrop {
    fn drop(&mut self) {
        if self.armed {
            let message = mem::take(&mut self.message);
            self.logger.log(self.level, message);
        }
    }
}
