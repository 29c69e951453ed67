#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! `tracing` integration for the fieldscope logging library.
//!
//! Two directions are supported:
//!
//! - **Spans into records**: [`SpanHook`] adds the chain of active `tracing`
//!   spans to every fieldscope record, so a log line tells which operation
//!   was running when it was written. [`SpanFieldsLayer`] must be part of
//!   the subscriber for span field values to show up.
//! - **Records into tracing**: [`TracingSink`] forwards fieldscope records as
//!   `tracing` events, for applications whose output is already handled by a
//!   `tracing` subscriber.
//!
//! # Quick Start
//!
//! ```
//! use fieldscope::{Logger, SharedBuffer};
//! use fieldscope_tracing::{SpanFieldsLayer, SpanHook};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! let subscriber = Registry::default().with(SpanFieldsLayer);
//! let buffer = SharedBuffer::new();
//! let logger = Logger::builder()
//!     .writer(buffer.clone())
//!     .hook(SpanHook::new())
//!     .build();
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     let span = tracing::info_span!("checkout", cart = 42);
//!     let _entered = span.enter();
//!     logger.info("charged");
//! });
//!
//! assert!(buffer.contents().contains("span=\"checkout{cart=42}\""));
//! ```
//!
//! # Environment Variables
//!
//! - `FIELDSCOPE_TRACING` - Comma-separated options:
//!   - `errors` - Only add spans to records carrying an error

use std::{
    fmt::{self, Write},
    io,
    sync::OnceLock,
};

use fieldscope::{
    Level, Value,
    hooks::{Hook, HookError},
    record::Record,
    sink::Sink,
};
use tracing::{
    Span,
    field::{Field, Visit},
};
use tracing_subscriber::registry::LookupSpan;

/// Key under which [`SpanHook`] stores the span chain by default.
pub const SPAN_KEY: &str = "span";

#[derive(Clone, Debug, Default)]
struct CapturedFields(String);

struct FieldVisitor<'a> {
    output: &'a mut String,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if !self.output.is_empty() {
            self.output.push(' ');
        }
        let _ = write!(self.output, "{}={:?}", field.name(), value);
    }
}

/// A [`tracing_subscriber::Layer`] that keeps the field values of every span.
///
/// `tracing` only hands span fields to subscribers when the span is created
/// or recorded to. This layer stores them in the span's extensions, where
/// [`SpanHook`] reads them back.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpanFieldsLayer;

impl<S> tracing_subscriber::Layer<S> for SpanFieldsLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut buf = String::new();
        attrs.record(&mut FieldVisitor { output: &mut buf });
        span.extensions_mut().insert(CapturedFields(buf));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<CapturedFields>() {
            values.record(&mut FieldVisitor {
                output: &mut fields.0,
            });
        } else {
            let mut buf = String::new();
            values.record(&mut FieldVisitor { output: &mut buf });
            extensions.insert(CapturedFields(buf));
        }
    }
}

/// Renders the spans entered on the current thread, outermost first, as
/// `outer{a=1}:inner{b=2}`.
///
/// Returns `None` when no span is active or when the current subscriber is
/// not built on a [`tracing_subscriber::Registry`]. Spans show no fields
/// unless [`SpanFieldsLayer`] is installed.
pub fn current_span_chain() -> Option<String> {
    let span = Span::current();
    span.with_subscriber(|(id, dispatch)| {
        let registry = dispatch.downcast_ref::<tracing_subscriber::Registry>()?;
        let span_ref = registry.span(id)?;

        let mut out = String::new();
        for ancestor in span_ref.scope().from_root() {
            if !out.is_empty() {
                out.push(':');
            }
            out.push_str(ancestor.name());
            let extensions = ancestor.extensions();
            if let Some(fields) = extensions.get::<CapturedFields>()
                && !fields.0.is_empty()
            {
                let _ = write!(out, "{{{}}}", fields.0);
            }
        }
        Some(out)
    })
    .flatten()
}

#[derive(Debug)]
struct TracingEnvOptions {
    errors_only: bool,
}

impl TracingEnvOptions {
    fn get() -> &'static Self {
        static TRACING_FLAGS: OnceLock<TracingEnvOptions> = OnceLock::new();

        TRACING_FLAGS.get_or_init(|| {
            let mut errors_only = false;

            if let Some(var) = std::env::var_os("FIELDSCOPE_TRACING") {
                for v in var.to_string_lossy().split(',') {
                    if v.eq_ignore_ascii_case("errors") {
                        errors_only = true;
                    }
                }
            }

            TracingEnvOptions { errors_only }
        })
    }
}

/// A [`Hook`] adding the active span chain to records.
///
/// A field already present under the same key is left untouched.
#[derive(Copy, Clone, Debug)]
pub struct SpanHook {
    /// The field key, [`SPAN_KEY`] by default.
    pub key: &'static str,
    /// Only annotate records that carry an error.
    pub errors_only: bool,
}

impl SpanHook {
    /// Creates a hook configured from `FIELDSCOPE_TRACING`.
    pub fn new() -> Self {
        Self {
            key: SPAN_KEY,
            errors_only: TracingEnvOptions::get().errors_only,
        }
    }
}

impl Default for SpanHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook for SpanHook {
    fn fire(&self, record: &mut Record) -> Result<(), HookError> {
        if (self.errors_only && record.error().is_none()) || record.fields.contains_key(self.key) {
            return Ok(());
        }
        if let Some(chain) = current_span_chain() {
            record.fields.insert(self.key.to_owned(), Value::from(chain));
        }
        Ok(())
    }
}

/// Extension trait adding the current span chain to a logger.
///
/// Unlike [`SpanHook`], the chain is captured when the method is called, not
/// when the record is emitted.
pub trait SpanExt: Sized {
    /// Adds the current span chain under [`SPAN_KEY`], if a span is active.
    fn with_span(self) -> Self;
}

impl SpanExt for fieldscope::Logger {
    fn with_span(self) -> Self {
        match current_span_chain() {
            Some(chain) => self.with_field(SPAN_KEY, chain),
            None => self,
        }
    }
}

/// A [`Sink`] emitting every record as a `tracing` event.
///
/// The formatted line is ignored. Events use the `fieldscope` target, the
/// record message as their message and the record fields rendered as
/// `key=value` pairs in a `fields` field. `Fatal` and `Panic` map to
/// `ERROR`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

fn render_fields(record: &Record) -> String {
    let mut out = String::new();
    for (key, value) in &record.fields {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{key}={value}");
    }
    out
}

impl Sink for TracingSink {
    fn write(&self, record: &Record, _line: &[u8]) -> io::Result<()> {
        let fields = render_fields(record);
        let message = record.message.as_str();
        match record.level {
            Level::Panic | Level::Fatal | Level::Error => {
                tracing::error!(target: "fieldscope", fields = %fields, "{message}");
            }
            Level::Warn => tracing::warn!(target: "fieldscope", fields = %fields, "{message}"),
            Level::Info => tracing::info!(target: "fieldscope", fields = %fields, "{message}"),
            Level::Debug => tracing::debug!(target: "fieldscope", fields = %fields, "{message}"),
            Level::Trace => tracing::trace!(target: "fieldscope", fields = %fields, "{message}"),
        }
        Ok(())
    }
}
