use std::io;

use super::{Logger, LoggerCore};
use crate::{
    format::{Formatter, TextFormatter},
    hooks::{Hook, LevelHooks},
    level::Level,
    sink::{Sink, WriterSink},
    value::{Fields, Value},
};

/// Configures a [`Logger`].
///
/// By default records at [`Level::Info`] and more severe are written to
/// standard error with the [`TextFormatter`].
///
/// ```rust
/// use fieldscope::{Level, Logger, SharedBuffer, format::TextFormatter};
///
/// let buffer = SharedBuffer::new();
/// let logger = Logger::builder()
///     .writer(buffer.clone())
///     .formatter(TextFormatter { disable_timestamp: true, ..TextFormatter::DEFAULT })
///     .level(Level::Debug)
///     .field("app", "demo")
///     .build();
///
/// logger.debug("ready");
/// assert_eq!(buffer.contents(), "level=debug msg=ready app=demo\n");
/// ```
pub struct LoggerBuilder {
    sink: Option<Box<dyn Sink>>,
    formatter: Box<dyn Formatter>,
    level: Level,
    hooks: LevelHooks,
    fields: Fields,
}

impl LoggerBuilder {
    pub(crate) fn new() -> Self {
        Self {
            sink: None,
            formatter: Box::new(TextFormatter::DEFAULT),
            level: Level::Info,
            hooks: LevelHooks::new(),
            fields: Fields::new(),
        }
    }

    /// Writes records to `writer`.
    pub fn writer<W: io::Write + Send + 'static>(self, writer: W) -> Self {
        self.sink(WriterSink::new(writer))
    }

    /// Hands records to `sink`.
    pub fn sink<S: Sink>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Renders records with `formatter`.
    pub fn formatter<F: Formatter>(mut self, formatter: F) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Drops records more verbose than `level`.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Registers a hook.
    pub fn hook<H: Hook>(mut self, hook: H) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Replaces the registered hooks.
    pub fn hooks(mut self, hooks: LevelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Adds a field present on every record of the logger.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builds the logger.
    pub fn build(self) -> Logger {
        let sink = self
            .sink
            .unwrap_or_else(|| Box::new(WriterSink::new(io::stderr())));
        Logger::from_core(
            LoggerCore {
                sink,
                formatter: self.formatter,
                level: self.level,
                hooks: self.hooks,
            },
            self.fields,
        )
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerBuilder")
            .field("level", &self.level)
            .field("hooks", &self.hooks)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
