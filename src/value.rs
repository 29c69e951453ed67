//! Field values and the shared error handle.

use std::{error::Error, fmt, ops::Deref, sync::Arc, time::Duration};

use indexmap::IndexMap;
use num_complex::Complex;

/// Key under which errors are stored in a record's fields.
pub const ERROR_KEY: &str = "error";

/// An ordered set of named fields.
pub type Fields = IndexMap<String, Value>;

/// A single structured field value.
///
/// The set of variants is closed. Integers are widened to 64 or 128 bits so
/// that any integer width can be stored without loss.
#[derive(Clone, Debug)]
pub enum Value {
    /// Text.
    Str(String),
    /// A boolean.
    Bool(bool),
    /// A signed integer of up to 64 bits.
    I64(i64),
    /// A signed 128 bit integer.
    I128(i128),
    /// An unsigned integer of up to 64 bits.
    U64(u64),
    /// An unsigned 128 bit integer.
    U128(u128),
    /// A single precision float.
    F32(f32),
    /// A double precision float.
    F64(f64),
    /// A duration, rendered as `1.5s`, `250ms`, ...
    Duration(Duration),
    /// A single precision complex number.
    Complex32(Complex<f32>),
    /// A double precision complex number.
    Complex64(Complex<f64>),
    /// An error.
    Error(LogError),
}

impl Value {
    /// Returns the contained error, if this is an error value.
    pub fn as_error(&self) -> Option<&LogError> {
        match self {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the contained text, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => f.write_str(v),
            Value::Bool(v) => fmt::Display::fmt(v, f),
            Value::I64(v) => fmt::Display::fmt(v, f),
            Value::I128(v) => fmt::Display::fmt(v, f),
            Value::U64(v) => fmt::Display::fmt(v, f),
            Value::U128(v) => fmt::Display::fmt(v, f),
            Value::F32(v) => fmt::Display::fmt(v, f),
            Value::F64(v) => fmt::Display::fmt(v, f),
            Value::Duration(v) => fmt::Debug::fmt(v, f),
            Value::Complex32(v) => write!(f, "({v})"),
            Value::Complex64(v) => write!(f, "({v})"),
            Value::Error(v) => fmt::Display::fmt(v, f),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Value::$variant(<$target>::from(value))
                }
            }
        )*
    };
}

value_from! {
    String => Str as String,
    &str => Str as String,
    bool => Bool as bool,
    i8 => I64 as i64,
    i16 => I64 as i64,
    i32 => I64 as i64,
    i64 => I64 as i64,
    i128 => I128 as i128,
    u8 => U64 as u64,
    u16 => U64 as u64,
    u32 => U64 as u64,
    u64 => U64 as u64,
    u128 => U128 as u128,
    f32 => F32 as f32,
    f64 => F64 as f64,
    Duration => Duration as Duration,
    Complex<f32> => Complex32 as Complex<f32>,
    Complex<f64> => Complex64 as Complex<f64>,
    LogError => Error as LogError,
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        // isize is at most 64 bits on every supported target
        Value::I64(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::U64(value as u64)
    }
}

/// A cheaply cloneable, type-erased error.
///
/// Any `E: Error + Send + Sync + 'static` converts into a `LogError`, which
/// lets errors be stored in fields, deferred through a [`Slot`], and handed
/// to alert sinks without losing the original value.
///
/// `LogError` deliberately does not implement [`Error`] itself, so that the
/// blanket conversion stays coherent; use [`LogError::as_error`] or deref to
/// reach the underlying error.
///
/// ```rust
/// use fieldscope::LogError;
///
/// let err = LogError::msg("disk full");
/// assert_eq!(err.to_string(), "disk full");
///
/// let io: LogError = std::io::Error::other("broken pipe").into();
/// assert!(io.downcast_ref::<std::io::Error>().is_some());
/// ```
///
/// [`Slot`]: crate::Slot
#[derive(Clone)]
pub struct LogError(Arc<dyn Error + Send + Sync + 'static>);

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for MessageError {}

impl LogError {
    /// Creates an error carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(Arc::new(MessageError(message.to_string())))
    }

    /// Wraps an already boxed error.
    pub fn from_boxed(err: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self(Arc::from(err))
    }

    /// Borrows the underlying error.
    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempts to downcast to a concrete error type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both handles point to the same error instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> From<E> for LogError
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self(Arc::new(err))
    }
}

impl Deref for LogError {
    type Target = dyn Error + Send + Sync + 'static;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Collects `(key, value)` pairs into [`Fields`].
///
/// ```rust
/// use fieldscope::{Value, fields};
///
/// let fields = fields([("user", Value::from("alice")), ("attempt", Value::from(3))]);
/// assert_eq!(fields.len(), 2);
/// ```
pub fn fields<K, I>(pairs: I) -> Fields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(65.5f64).to_string(), "65.5");
        assert_eq!(Value::from(-3i8).to_string(), "-3");
        assert_eq!(Value::from(Duration::from_secs(1)).to_string(), "1s");
        assert_eq!(Value::from(Duration::from_millis(250)).to_string(), "250ms");
        assert_eq!(Value::from(Complex::new(3.0f64, 2.0)).to_string(), "(3+2i)");
        assert_eq!(Value::from(true).to_string(), "true");
    }

    #[test]
    fn test_log_error_keeps_source_type() {
        let err: LogError = std::io::Error::other("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert!(err.downcast_ref::<std::io::Error>().is_some());
        let clone = err.clone();
        assert!(err.ptr_eq(&clone));
    }

    #[test]
    fn test_log_error_send_sync() {
        static_assertions::assert_impl_all!(LogError: Send, Sync, Clone);
        static_assertions::assert_impl_all!(Value: Send, Sync, Clone);
    }
}
