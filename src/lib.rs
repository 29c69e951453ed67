#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Structured logging with loggers that follow the call scope.
//!
//! ## Overview
//!
//! Logging a request well usually means gathering information at many
//! layers: a middleware knows the request id, an authentication layer knows
//! the user, a handler knows what it was asked to do, and only the outermost
//! layer knows whether the whole thing succeeded. This crate lets every layer
//! contribute to the same records without threading a logger through return
//! values:
//!
//! - **[`Scope`]**: a handle to a shared, mutable logger for the current call
//!   chain. Fields, errors and a severity ceiling added through any copy of
//!   the handle are visible to every other copy.
//! - **[`Slot`] and [`Logger::defer`]**: fields registered up front whose
//!   value is read when the record is emitted, so one statement at the top
//!   of a function can report what the function body computed.
//! - **[`Logger::err_level`]**: a severity floor applied only when the record
//!   carries an error, to log successes quietly and failures loudly with a
//!   single statement.
//!
//! ## Quick example
//!
//! ```rust
//! use fieldscope::{ErrorSlot, Level, Logger, LogError, Scope, SharedBuffer, Slot};
//!
//! fn handle(scope: &Scope, user: &str) -> Result<u32, LogError> {
//!     let rows = Slot::<u32>::empty();
//!     let err = ErrorSlot::empty();
//!     let _log = scope
//!         .logger()
//!         .defer("rows", &rows)
//!         .defer_error(&err)
//!         .err_level(Level::Error)
//!         .on_drop(Level::Debug, "query");
//!
//!     scope.with_field("user", user.to_owned());
//!     if user.is_empty() {
//!         return err.track(Err(LogError::msg("no user")));
//!     }
//!     rows.set(3);
//!     Ok(3)
//! }
//!
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder().writer(buffer.clone()).level(Level::Debug).build();
//! let scope = Scope::new().attach(logger);
//!
//! handle(&scope, "alice").unwrap();
//! handle(&scope, "").unwrap_err();
//!
//! let lines = buffer.lines();
//! assert!(lines[0].contains("level=debug") && lines[0].contains("rows=3"));
//! assert!(lines[1].contains("level=error") && lines[1].contains("error=\"no user\""));
//! assert!(!lines[1].contains("rows="));
//! ```
//!
//! ## Output
//!
//! [`Logger`] renders records with a [`Formatter`](format::Formatter)
//! ([`TextFormatter`](format::TextFormatter) by default, or
//! [`JsonFormatter`](format::JsonFormatter) with the `json` feature) and
//! hands them to a [`Sink`]. [Hooks](hooks) observe every record and can
//! forward severe ones to an [alerting service](hooks::alert).
//!
//! The crate reports its own failures, such as a sink that cannot be written
//! to, as `tracing` warnings.
//!
//! ## Environment Variables
//!
//! - `FIELDSCOPE_LEVEL` - Threshold of the default logger, used until
//!   [`set_default_logger`] is called. Defaults to `info`.
//! - `APP_ENV`, `APP_VERSION`, `ALERT_API_KEY` - Read by
//!   [`AlertOptions::from_env`](hooks::alert::AlertOptions::from_env).

#[macro_use]
mod macros;

pub mod deferred;
mod env;
pub mod escalate;
pub mod format;
pub mod frames;
mod global;
pub mod hooks;
pub mod level;
pub mod logger;
pub mod prelude;
pub mod record;
pub mod scope;
pub mod sink;
pub mod slot;
pub mod triggers;
pub mod value;

pub use self::{
    deferred::Deferred,
    frames::{FrameProvider, FramedError, StackFrame},
    global::{default_logger, reset_default_logger, set_default_logger},
    level::{Level, ParseLevelError},
    logger::{EmitOnDrop, Logger, LoggerBuilder},
    record::Record,
    scope::{FieldScope, Scope, ScopeGuard},
    sink::{Discard, SharedBuffer, Sink, WriterSink},
    slot::{ErrorSlot, Slot},
    value::{ERROR_KEY, Fields, LogError, Value, fields},
};

// Not public API. Referenced by fieldscope-backtrace.
#[doc(hidden)]
pub mod __private {
    // Lets fieldscope-backtrace recognize frames from this crate.
    pub const FIELDSCOPE_LOCATION: &std::panic::Location = std::panic::Location::caller();
}
