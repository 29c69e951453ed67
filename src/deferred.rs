//! Deferred fields: values captured by reference and read at emission time.
//!
//! A deferred field pairs a key with a [`Slot`]. Nothing is read when the
//! field is registered; the slot's value is looked up only when the record
//! is built. This is what lets a single statement at the top of a function
//! report values that the function body computes later:
//!
//! ```rust
//! use fieldscope::{Level, Logger, SharedBuffer, Slot};
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::new(buffer.clone());
//!
//! fn handle(logger: &Logger) {
//!     let user = Slot::<String>::empty();
//!     let rows = Slot::<u64>::empty();
//!     let _done = logger
//!         .defer("user", &user)
//!         .defer("rows", &rows)
//!         .on_drop(Level::Info, "request handled");
//!
//!     user.set("alice".to_string());
//!     rows.set(42);
//! }
//!
//! handle(&logger);
//! let out = buffer.contents();
//! assert!(out.contains("user=alice"));
//! assert!(out.contains("rows=42"));
//! ```
//!
//! # Supported kinds
//!
//! Resolution goes through a closed table keyed by [`TypeId`]: text
//! (`String`, `&'static str`), `bool`, every integer width, `f32`, `f64`,
//! [`Duration`], [`Complex<f32>`], [`Complex<f64>`] and [`LogError`]. A slot
//! of any other type resolves to the placeholder `<unsupported TYPE>`
//! instead of failing.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    sync::{Mutex, OnceLock, PoisonError},
    time::Duration,
};

use hashbrown::HashMap;
use num_complex::Complex;
use rustc_hash::FxBuildHasher;
use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{
    slot::Slot,
    value::{LogError, Value},
};

type Resolver = fn(&dyn Any) -> Option<Value>;

type ResolverTable = HashMap<TypeId, Resolver, FxBuildHasher>;

fn resolvers() -> &'static ResolverTable {
    static RESOLVERS: OnceLock<ResolverTable> = OnceLock::new();

    macro_rules! register {
        ($table:ident: $($ty:ty),* $(,)?) => {
            $(
                $table.insert(TypeId::of::<$ty>(), (|value: &dyn Any| {
                    value.downcast_ref::<$ty>().map(|v| Value::from(v.clone()))
                }) as Resolver);
            )*
        };
    }

    RESOLVERS.get_or_init(|| {
        let mut table = ResolverTable::default();
        register!(table:
            String, &'static str, bool,
            i8, i16, i32, i64, i128, isize,
            u8, u16, u32, u64, u128, usize,
            f32, f64,
            Duration, Complex<f32>, Complex<f64>,
            LogError,
        );
        table
    })
}

/// Resolves a value of a known type name through the resolver table.
fn resolve_any(value: &dyn Any, type_name: &'static str) -> Value {
    resolvers()
        .get(&value.type_id())
        .and_then(|resolve| resolve(value))
        .unwrap_or_else(|| Value::Str(format!("<unsupported {type_name}>")))
}

trait ErasedSlot: 'static + Send + Sync {
    fn resolve(&self) -> Option<Value>;
}

impl<T: Any + Send> ErasedSlot for Mutex<Option<T>> {
    fn resolve(&self) -> Option<Value> {
        let guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        let value: &T = guard.as_ref()?;
        Some(resolve_any(value, type_name::<T>()))
    }
}

#[derive(Clone)]
enum Source {
    Nil,
    Cell(Arc<dyn ErasedSlot>),
    Resolved(Value),
}

/// The reference half of a deferred field.
///
/// Usually created implicitly from `&Slot<T>` when calling
/// [`Logger::defer`]. `Option<&Slot<T>>` is accepted too, where `None` plays
/// the role of a nil reference and produces no field.
///
/// [`Logger::defer`]: crate::Logger::defer
#[derive(Clone)]
pub struct Deferred(Source);

impl Deferred {
    /// A nil reference; the field is always omitted.
    pub const fn nil() -> Self {
        Self(Source::Nil)
    }

    /// A plain value, treated as already resolved.
    ///
    /// Values of an unsupported type become the `<unsupported TYPE>`
    /// placeholder right away.
    pub fn value<T: Any>(value: T) -> Self {
        Self(Source::Resolved(resolve_any(&value, type_name::<T>())))
    }

    /// A plain optional value; `None` is skipped like a nil reference.
    pub fn maybe<T: Any>(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::value(value),
            None => Self::nil(),
        }
    }

    /// Reads the referenced value.
    ///
    /// Returns `None` when the field must be omitted.
    pub fn resolve(&self) -> Option<Value> {
        match &self.0 {
            Source::Nil => None,
            Source::Cell(cell) => cell.resolve(),
            Source::Resolved(value) => Some(value.clone()),
        }
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Source::Nil => f.write_str("Deferred(nil)"),
            Source::Cell(_) => f.write_str("Deferred(<cell>)"),
            Source::Resolved(value) => f.debug_tuple("Deferred").field(value).finish(),
        }
    }
}

impl<T: Any + Send> From<&Slot<T>> for Deferred {
    fn from(slot: &Slot<T>) -> Self {
        let cell = Arc::clone(&slot.0).unsize(unsize::Coercion!(to dyn ErasedSlot));
        Self(Source::Cell(cell))
    }
}

impl<T: Any + Send> From<Option<&Slot<T>>> for Deferred {
    fn from(slot: Option<&Slot<T>>) -> Self {
        slot.map_or_else(Deferred::nil, Deferred::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_resolution_happens_on_read() {
        let slot = Slot::<i32>::empty();
        let deferred = Deferred::from(&slot);
        assert!(deferred.resolve().is_none());

        slot.set(7);
        assert_eq!(deferred.resolve().map(|v| v.to_string()).as_deref(), Some("7"));

        slot.set(8);
        assert_eq!(deferred.resolve().map(|v| v.to_string()).as_deref(), Some("8"));
    }

    #[test]
    fn test_unsupported_kind_yields_placeholder() {
        let (tx, _rx) = mpsc::channel::<i32>();
        let slot = Slot::new(tx);
        let value = Deferred::from(&slot).resolve().map(|v| v.to_string());
        assert_eq!(
            value,
            Some(format!("<unsupported {}>", type_name::<mpsc::Sender<i32>>()))
        );
    }

    #[test]
    fn test_nil_references() {
        assert!(Deferred::nil().resolve().is_none());
        assert!(Deferred::from(None::<&Slot<String>>).resolve().is_none());
        assert!(Deferred::maybe(None::<u8>).resolve().is_none());
        assert!(Deferred::maybe(Some(1u8)).resolve().is_some());
    }

    #[test]
    fn test_raw_values_resolve_immediately() {
        let deferred = Deferred::value(String::from("fixed"));
        assert_eq!(deferred.resolve().and_then(|v| v.as_str().map(str::to_owned)).as_deref(), Some("fixed"));

        let unsupported = Deferred::value(vec![1u8]);
        assert_eq!(
            unsupported.resolve().map(|v| v.to_string()),
            Some(format!("<unsupported {}>", type_name::<Vec<u8>>()))
        );
    }

    #[test]
    fn test_every_scalar_kind_is_registered() {
        let table = resolvers();
        let ids = [
            TypeId::of::<String>(),
            TypeId::of::<&'static str>(),
            TypeId::of::<bool>(),
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<u128>(),
            TypeId::of::<usize>(),
            TypeId::of::<f32>(),
            TypeId::of::<f64>(),
            TypeId::of::<Duration>(),
            TypeId::of::<Complex<f32>>(),
            TypeId::of::<Complex<f64>>(),
            TypeId::of::<LogError>(),
        ];
        for id in ids {
            assert!(table.contains_key(&id));
        }
        assert_eq!(table.len(), ids.len());
    }
}
