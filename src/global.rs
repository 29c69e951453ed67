//! The process-wide default logger.
//!
//! Used whenever a [`Scope`](crate::Scope) has no logger attached and by
//! the [triggers](crate::triggers) when no logger is passed in. Until one is
//! installed with [`set_default_logger`], the default writes text lines to
//! standard error at the threshold named by the `FIELDSCOPE_LEVEL`
//! environment variable, or [`Level::Info`].

use std::sync::OnceLock;

use crate::{env::EnvOptions, level::Level, logger::Logger};

#[repr(transparent)]
struct GlobalLock<T: 'static + Send + Sync>(spin::RwLock<Option<T>>);

impl<T: 'static + Send + Sync + Clone> GlobalLock<T> {
    #[must_use]
    const fn new() -> Self {
        Self(spin::RwLock::new(None))
    }

    #[inline]
    fn get(&'static self) -> Option<T> {
        self.0.read().clone()
    }

    #[inline]
    fn replace(&'static self, value: Option<T>) -> Option<T> {
        std::mem::replace(&mut *self.0.write(), value)
    }
}

static DEFAULT_LOGGER: GlobalLock<Logger> = GlobalLock::new();

fn fallback() -> &'static Logger {
    static FALLBACK: OnceLock<Logger> = OnceLock::new();

    FALLBACK.get_or_init(|| {
        Logger::builder()
            .level(EnvOptions::get().level.unwrap_or(Level::Info))
            .build()
    })
}

/// Returns the current default logger.
pub fn default_logger() -> Logger {
    DEFAULT_LOGGER.get().unwrap_or_else(|| fallback().clone())
}

/// Installs `logger` as the default logger, returning the previously
/// installed one.
///
/// ```rust
/// use fieldscope::{Logger, Scope, SharedBuffer, set_default_logger};
///
/// let buffer = SharedBuffer::new();
/// let previous = set_default_logger(Logger::new(buffer.clone()));
///
/// Scope::new().info("no logger attached");
/// assert!(buffer.contents().contains("msg=\"no logger attached\""));
/// # fieldscope::reset_default_logger();
/// # drop(previous);
/// ```
pub fn set_default_logger(logger: Logger) -> Option<Logger> {
    DEFAULT_LOGGER.replace(Some(logger))
}

/// Uninstalls the default logger, going back to the standard error logger.
pub fn reset_default_logger() -> Option<Logger> {
    DEFAULT_LOGGER.replace(None)
}
