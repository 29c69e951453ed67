//! Call-scoped, shared, mutable loggers.
//!
//! A [`Scope`] is a cheap handle passed down a call chain. Attaching a logger
//! to it creates a [`FieldScope`]: a lock-protected accumulator holding the
//! logger, the fields gathered so far and an optional severity ceiling.
//! Every handle derived from the attach point sees the same accumulator, so
//! a middleware can add a field and the layers above it will find that field
//! in their own records later, without the handle being returned or
//! reassigned.
//!
//! ```rust
//! use fieldscope::{Logger, LogError, Scope, SharedBuffer};
//!
//! fn authenticate(scope: &Scope) {
//!     scope.with_field("user", "alice");
//! }
//!
//! fn handler(scope: &Scope) -> Result<(), LogError> {
//!     scope.logger().with_field("local", true).info("handling");
//!     Err(LogError::msg("oops"))
//! }
//!
//! let buffer = SharedBuffer::new();
//! let scope = Scope::new().attach(Logger::new(buffer.clone()));
//! authenticate(&scope);
//! if let Err(err) = handler(&scope) {
//!     scope.with_error(err).warn("request failed");
//! }
//!
//! let lines = buffer.lines();
//! assert!(lines[0].contains("user=alice") && lines[0].contains("local=true"));
//! assert!(lines[1].contains("error=oops") && !lines[1].contains("local="));
//! ```
//!
//! # Ambient scope
//!
//! When threading the handle through every call is impractical, a scope can
//! be [entered](Scope::enter) on the current thread and fetched back with
//! [`Scope::current`].

use std::{
    cell::RefCell,
    fmt,
    marker::PhantomData,
    sync::{Mutex, MutexGuard, PoisonError},
};

use triomphe::Arc;

use crate::{
    escalate,
    global::default_logger,
    level::Level,
    logger::Logger,
    macros::level_methods,
    value::{LogError, Value},
};

struct ScopeState {
    logger: Logger,
    ceiling: Option<Level>,
}

/// The shared accumulator behind an attached [`Scope`].
///
/// The lock is only held to copy or update the logger, never while a record
/// is formatted or written.
pub struct FieldScope {
    state: Mutex<ScopeState>,
}

impl FieldScope {
    fn new(logger: Logger) -> Self {
        Self {
            state: Mutex::new(ScopeState {
                logger,
                ceiling: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A snapshot of the accumulated logger.
    pub fn logger(&self) -> Logger {
        self.lock().logger.clone()
    }

    /// The severity ceiling, if one was set.
    pub fn ceiling(&self) -> Option<Level> {
        self.lock().ceiling
    }

    fn update(&self, f: impl FnOnce(&mut ScopeState)) {
        f(&mut self.lock());
    }

    fn snapshot(&self) -> (Logger, Option<Level>) {
        let state = self.lock();
        (state.logger.clone(), state.ceiling)
    }
}

impl fmt::Debug for FieldScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("FieldScope")
            .field("logger", &state.logger)
            .field("ceiling", &state.ceiling)
            .finish()
    }
}

/// A handle to the logger of the current call scope.
///
/// The empty scope ([`Scope::new`]) has no logger attached: its mutators do
/// nothing and it logs through the [default logger](crate::default_logger).
///
/// Clones share the attached [`FieldScope`].
#[derive(Clone, Default)]
pub struct Scope(Option<Arc<FieldScope>>);

impl Scope {
    /// A scope with no logger attached.
    pub const fn new() -> Self {
        Self(None)
    }

    /// Returns a handle with a fresh [`FieldScope`] holding `logger`.
    ///
    /// Any field scope reachable from `self` is shadowed, not merged: the
    /// new handle starts from `logger` alone, and nothing written through it
    /// reaches the outer scope.
    pub fn attach(&self, logger: Logger) -> Scope {
        Scope(Some(Arc::new(FieldScope::new(logger))))
    }

    /// Like [`attach`](Self::attach), unless a field scope is already
    /// reachable, in which case an equivalent handle is returned and
    /// `logger` is dropped.
    ///
    /// Use this in middleware that may or may not run below another one.
    pub fn attach_if_absent(&self, logger: Logger) -> Scope {
        if self.is_attached() {
            self.clone()
        } else {
            self.attach(logger)
        }
    }

    /// Returns `true` if a logger is attached.
    pub fn is_attached(&self) -> bool {
        self.0.is_some()
    }

    /// The attached field scope.
    pub fn field_scope(&self) -> Option<&FieldScope> {
        self.0.as_deref()
    }

    /// Returns `true` if both handles share the same field scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// A snapshot of the accumulated logger, or the default logger when
    /// nothing is attached.
    ///
    /// The snapshot is an ordinary [`Logger`]: fields added to it stay
    /// local, and later changes to the scope do not show up in it.
    pub fn logger(&self) -> Logger {
        match &self.0 {
            Some(scope) => scope.logger(),
            None => default_logger(),
        }
    }

    /// The severity ceiling set with [`with_level`](Self::with_level).
    pub fn ceiling(&self) -> Option<Level> {
        self.0.as_ref().and_then(|scope| scope.ceiling())
    }

    fn update(&self, f: impl FnOnce(&mut ScopeState)) -> &Scope {
        if let Some(scope) = &self.0 {
            scope.update(f);
        }
        self
    }

    /// Adds a field to the attached logger.
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> &Scope {
        let (key, value) = (key.into(), value.into());
        self.update(|state| state.logger.insert_field(key, value))
    }

    /// Adds several fields to the attached logger.
    pub fn with_fields<K, V, I>(&self, fields: I) -> &Scope
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update(|state| state.logger.extend_fields(fields))
    }

    /// Attaches an error to the attached logger.
    pub fn with_error(&self, err: impl Into<LogError>) -> &Scope {
        self.with_error_opt(Some(err.into()))
    }

    /// Attaches an error if there is one; `None` clears a previously
    /// attached error.
    pub fn with_error_opt(&self, err: Option<LogError>) -> &Scope {
        self.update(|state| state.logger.set_error(err))
    }

    /// Sets the severity ceiling.
    ///
    /// Records emitted through the scope are never more verbose than the
    /// ceiling: with a ceiling of [`Level::Info`], a `debug` call produces an
    /// `info` record while `warn` and `error` calls are unaffected. Records
    /// emitted through a [`logger`](Self::logger) snapshot are not clamped.
    pub fn with_level(&self, ceiling: Level) -> &Scope {
        self.update(|state| state.ceiling = Some(ceiling))
    }

    /// Emits `message` through the attached logger, clamped to the ceiling.
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        match &self.0 {
            Some(scope) => {
                let (logger, ceiling) = scope.snapshot();
                logger.log(escalate::clamp_to_ceiling(level, ceiling), message);
            }
            None => default_logger().log(level, message),
        }
    }

    /// Emits the output of `format_args!`, clamped to the ceiling.
    pub fn logf(&self, level: Level, args: fmt::Arguments<'_>) {
        self.log(level, args)
    }

    /// Emits `parts` separated by spaces, clamped to the ceiling.
    pub fn logln(&self, level: Level, parts: &[&dyn fmt::Display]) {
        let (logger, ceiling) = match &self.0 {
            Some(scope) => scope.snapshot(),
            None => (default_logger(), None),
        };
        logger.logln(escalate::clamp_to_ceiling(level, ceiling), parts);
    }

    level_methods!();

    /// Makes this scope the [current](Self::current) one on this thread
    /// until the returned guard is dropped.
    ///
    /// ```rust
    /// use fieldscope::{Logger, Scope, SharedBuffer};
    ///
    /// fn deep_inside() {
    ///     Scope::current().with_field("step", 3).info("working");
    /// }
    ///
    /// let buffer = SharedBuffer::new();
    /// let scope = Scope::new().attach(Logger::new(buffer.clone()));
    /// {
    ///     let _entered = scope.enter();
    ///     deep_inside();
    /// }
    /// assert!(!Scope::current().is_attached());
    /// assert!(buffer.contents().contains("step=3"));
    /// ```
    pub fn enter(&self) -> ScopeGuard {
        let depth = CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len() - 1
        });
        ScopeGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// The innermost scope entered on this thread, or the empty scope.
    pub fn current() -> Scope {
        CURRENT
            .try_with(|stack| stack.borrow().last().cloned())
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(scope) => f.debug_tuple("Scope").field(&**scope).finish(),
            None => f.write_str("Scope(<detached>)"),
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a scope [entered](Scope::enter) on the current thread.
///
/// Dropping a guard also exits every scope entered after it.
#[must_use = "the scope is exited when the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let _ = CURRENT.try_with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}
