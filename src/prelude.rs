//! Commonly used items for convenient importing.
//!
//! ```rust
//! use fieldscope::prelude::*;
//!
//! let scope = Scope::new().attach(Logger::new(SharedBuffer::new()));
//! scope.with_fields(fields! { "a" => 1, "b" => "two" }).info("hello");
//! ```

pub use crate::{
    ErrorSlot, Level, LogError, Logger, Scope, SharedBuffer, Slot, Value, fields,
    triggers::{on_condition, on_err, on_time},
};
