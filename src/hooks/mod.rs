//! Per-level callbacks fired for every emitted record.
//!
//! Hooks run after deferred fields have been resolved and escalation has
//! been applied, right before the record is formatted. They receive the
//! record mutably and may add, rewrite or remove fields.
//!
//! ```rust
//! use fieldscope::{
//!     Level, Logger, SharedBuffer, Value,
//!     hooks::{Hook, HookError},
//!     record::Record,
//! };
//!
//! struct Hostname;
//!
//! impl Hook for Hostname {
//!     fn levels(&self) -> &[Level] {
//!         &[Level::Error, Level::Warn]
//!     }
//!
//!     fn fire(&self, record: &mut Record) -> Result<(), HookError> {
//!         record.fields.insert("host".into(), Value::from("db-1"));
//!         Ok(())
//!     }
//! }
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder().writer(buffer.clone()).hook(Hostname).build();
//! logger.info("fine");
//! logger.warn("odd");
//!
//! let lines = buffer.lines();
//! assert!(!lines[0].contains("host="));
//! assert!(lines[1].contains("host=db-1"));
//! ```
//!
//! A failing hook does not stop the record from being written; the failure
//! is reported as a `tracing` warning.
//!
//! - **[`alert`]**: a hook forwarding qualifying records to an external
//!   alerting service.

pub mod alert;

use std::{error::Error, fmt};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{level::Level, record::Record, value::LogError};

/// A callback invoked with every record emitted at one of its levels.
///
/// Closures of the form `Fn(&mut Record) -> Result<(), HookError>` are hooks
/// for every level.
pub trait Hook: 'static + Send + Sync {
    /// The levels this hook fires for. Defaults to every level.
    fn levels(&self) -> &[Level] {
        &Level::ALL
    }

    /// Called with the record about to be written.
    fn fire(&self, record: &mut Record) -> Result<(), HookError>;
}

impl<F> Hook for F
where
    F: Fn(&mut Record) -> Result<(), HookError> + 'static + Send + Sync,
{
    fn fire(&self, record: &mut Record) -> Result<(), HookError> {
        self(record)
    }
}

/// Error returned by a failing [`Hook`].
pub struct HookError(LogError);

impl HookError {
    /// Wraps the underlying cause.
    pub fn new(cause: impl Into<LogError>) -> Self {
        Self(cause.into())
    }

    /// Creates an error from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(LogError::msg(message))
    }
}

impl fmt::Debug for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookError").field(&self.0).finish()
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log hook failed: {}", self.0)
    }
}

impl Error for HookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_error())
    }
}

/// Hooks indexed by the level they fire for.
///
/// A hook registered for several levels is stored once and shared between
/// the per-level lists. Within a level, hooks fire in registration order.
#[derive(Clone, Default)]
pub struct LevelHooks(HashMap<Level, Vec<Arc<dyn Hook>>, FxBuildHasher>);

impl LevelHooks {
    /// Creates an empty set of hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` for each of its [`levels`](Hook::levels).
    pub fn add<H: Hook>(&mut self, hook: H) {
        let hook = Arc::new(hook).unsize(unsize::Coercion!(to dyn Hook));
        let mut seen = Vec::with_capacity(Level::ALL.len());
        for &level in hook.levels() {
            if seen.contains(&level) {
                continue;
            }
            seen.push(level);
            self.0.entry(level).or_default().push(Arc::clone(&hook));
        }
    }

    /// Returns `true` if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Number of hooks firing for `level`.
    pub fn count(&self, level: Level) -> usize {
        self.0.get(&level).map_or(0, Vec::len)
    }

    pub(crate) fn fire(&self, record: &mut Record) {
        let Some(hooks) = self.0.get(&record.level) else {
            return;
        };
        for hook in hooks {
            if let Err(error) = hook.fire(record) {
                tracing::warn!(%error, level = %record.level, "log hook failed");
            }
        }
    }
}

impl fmt::Debug for LevelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for level in Level::ALL {
            let count = self.count(level);
            if count > 0 {
                map.entry(&level, &count);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::value::{Fields, Value};

    struct Counting {
        levels: Vec<Level>,
        calls: std::sync::Arc<AtomicUsize>,
    }

    impl Hook for Counting {
        fn levels(&self) -> &[Level] {
            &self.levels
        }

        fn fire(&self, _record: &mut Record) -> Result<(), HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(level: Level) -> Record {
        Record {
            level,
            message: "m".into(),
            fields: Fields::new(),
            time: Utc::now(),
        }
    }

    #[test]
    fn test_fires_only_for_registered_levels() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let mut hooks = LevelHooks::new();
        hooks.add(Counting {
            levels: vec![Level::Error, Level::Error, Level::Warn],
            calls: calls.clone(),
        });
        assert_eq!(hooks.count(Level::Error), 1);

        hooks.fire(&mut record(Level::Info));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        hooks.fire(&mut record(Level::Error));
        hooks.fire(&mut record(Level::Warn));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_does_not_stop_later_hooks() {
        let mut hooks = LevelHooks::new();
        hooks.add(|_: &mut Record| -> Result<(), HookError> { Err(HookError::msg("nope")) });
        hooks.add(|record: &mut Record| -> Result<(), HookError> {
            record.fields.insert("seen".into(), Value::from(true));
            Ok(())
        });

        let mut record = record(Level::Debug);
        hooks.fire(&mut record);
        assert!(record.fields.contains_key("seen"));
    }

    #[test]
    fn test_hook_types_are_thread_safe() {
        static_assertions::assert_impl_all!(LevelHooks: Send, Sync, Clone);
        static_assertions::assert_impl_all!(HookError: Send, Sync, Error);
    }
}
