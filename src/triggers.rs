//! Conditional loggers.
//!
//! Each trigger returns either a usable logger or [`Logger::noop`], so the
//! logging statement itself stays unconditional. Combined with
//! [`Logger::run`], even the work of preparing fields can be skipped.
//!
//! ```rust
//! use fieldscope::{Logger, SharedBuffer, triggers};
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::new(buffer.clone());
//!
//! for attempt in 0..10 {
//!     triggers::on_condition(attempt % 5 == 0, Some(&logger)).infof(format_args!("attempt {attempt}"));
//! }
//! assert_eq!(buffer.lines().len(), 2);
//! ```

use std::{
    sync::mpsc::{Receiver, TryRecvError},
    time::Instant,
};

use crate::{global::default_logger, logger::Logger, value::LogError};

fn pick(logger: Option<&Logger>) -> Logger {
    logger.cloned().unwrap_or_else(default_logger)
}

/// Returns `logger` (or the default logger) if `cond` holds, a no-op logger
/// otherwise.
pub fn on_condition(cond: bool, logger: Option<&Logger>) -> Logger {
    if cond { pick(logger) } else { Logger::noop() }
}

/// Returns `logger` (or the default logger) with `err` attached if there is
/// an error, a no-op logger otherwise.
///
/// ```rust
/// use fieldscope::{Logger, LogError, SharedBuffer, triggers};
///
/// let buffer = SharedBuffer::new();
/// let logger = Logger::new(buffer.clone());
///
/// let result: Result<(), LogError> = Err(LogError::msg("refused"));
/// triggers::on_err(result.err(), Some(&logger)).warn("connect");
/// triggers::on_err(None, Some(&logger)).warn("connect");
///
/// assert_eq!(buffer.lines().len(), 1);
/// assert!(buffer.contents().contains("error=refused"));
/// ```
pub fn on_err(err: Option<LogError>, logger: Option<&Logger>) -> Logger {
    match err {
        Some(err) => pick(logger).with_error(err),
        None => Logger::noop(),
    }
}

/// Returns `logger` (or the default logger) if a tick is waiting on `tick`,
/// a no-op logger otherwise.
///
/// The channel is polled without blocking and at most one tick is consumed.
/// A disconnected channel never triggers.
pub fn on_time(tick: &Receiver<Instant>, logger: Option<&Logger>) -> Logger {
    let triggered = match tick.try_recv() {
        Ok(_) => true,
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
    };
    on_condition(triggered, logger)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::sink::SharedBuffer;

    #[test]
    fn test_on_condition_false_is_noop() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(buffer.clone());

        let mut called = false;
        on_condition(false, Some(&logger)).run(|_| called = true);
        on_condition(false, Some(&logger)).with_field("a", 1).error("dropped");
        assert!(!called);
        assert!(buffer.contents().is_empty());

        on_condition(true, Some(&logger)).run(|l| l.info("kept"));
        assert_eq!(buffer.lines().len(), 1);
    }

    #[test]
    fn test_on_condition_defaults_to_global_logger() {
        assert!(!on_condition(true, None).is_noop());
    }

    #[test]
    fn test_on_time_consumes_single_tick() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(buffer.clone());
        let (tx, rx) = mpsc::channel();

        on_time(&rx, Some(&logger)).info("before tick");
        tx.send(Instant::now()).unwrap();
        on_time(&rx, Some(&logger)).info("tick");
        on_time(&rx, Some(&logger)).info("after tick");
        drop(tx);
        on_time(&rx, Some(&logger)).info("disconnected");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("msg=tick"));
    }
}
