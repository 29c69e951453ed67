//! Reference cells for deferred fields.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use triomphe::Arc;

use crate::value::LogError;

/// A shared, cloneable cell whose current value is read when a log record
/// is emitted.
///
/// A `Slot` is the reference half of a deferred field: register it with
/// [`Logger::defer`] before the value is known, fill it in while the function
/// runs, and the record picks up whatever the slot holds at emission time.
/// An unset slot (`None`) contributes no field at all.
///
/// Clones share the same cell.
///
/// ```rust
/// use fieldscope::Slot;
///
/// let attempts = Slot::<u32>::empty();
/// let observer = attempts.clone();
/// assert_eq!(observer.get(), None);
///
/// attempts.set(3);
/// assert_eq!(observer.get(), Some(3));
/// ```
///
/// [`Logger::defer`]: crate::Logger::defer
pub struct Slot<T>(pub(crate) Arc<Mutex<Option<T>>>);

/// A slot holding an optional error, as used by [`Logger::defer_error`].
///
/// [`Logger::defer_error`]: crate::Logger::defer_error
pub type ErrorSlot = Slot<LogError>;

impl<T> Slot<T> {
    /// Creates an unset slot.
    pub fn empty() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    /// Creates a slot holding `value`.
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(Some(value))))
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value`, replacing the previous one.
    pub fn set(&self, value: T) {
        *self.lock() = Some(value);
    }

    /// Stores `value` and returns the previous one.
    pub fn replace(&self, value: T) -> Option<T> {
        self.lock().replace(value)
    }

    /// Unsets the slot and returns its value.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Returns `true` if the slot currently holds a value.
    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Runs `f` with the current value.
    ///
    /// The slot stays locked while `f` runs. Emitting a record from `f`
    /// through a logger that defers this same slot deadlocks; take a copy
    /// with [`Slot::get`] and log after `with` returns instead.
    ///
    /// ```rust
    /// use fieldscope::Slot;
    ///
    /// let retries = Slot::new(1u32);
    /// retries.with(|n| {
    ///     if let Some(n) = n {
    ///         *n += 1;
    ///     }
    /// });
    /// assert_eq!(retries.get(), Some(2));
    /// ```
    pub fn with<R>(&self, f: impl FnOnce(Option<&mut T>) -> R) -> R {
        f(self.lock().as_mut())
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.lock().clone()
    }
}

impl Slot<LogError> {
    /// Records `err` as the deferred error.
    ///
    /// ```rust
    /// use fieldscope::ErrorSlot;
    ///
    /// let err = ErrorSlot::empty();
    /// err.fail(std::io::Error::other("connection reset"));
    /// assert_eq!(err.get().map(|e| e.to_string()).as_deref(), Some("connection reset"));
    /// ```
    pub fn fail(&self, err: impl Into<LogError>) {
        self.set(err.into());
    }

    /// Records the error of `result`, if any, and passes the result through.
    pub fn track<V, E>(&self, result: Result<V, E>) -> Result<V, E>
    where
        E: Clone + Into<LogError>,
    {
        if let Err(err) = &result {
            self.set(err.clone().into());
        }
        result
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&*self.lock()).finish()
    }
}
