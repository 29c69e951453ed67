use std::sync::{Arc, Mutex};

use fieldscope::{Level, LogError, Logger, SharedBuffer};
use fieldscope_tracing::{SpanExt, SpanFieldsLayer, SpanHook, TracingSink, current_span_chain};
use tracing_subscriber::{Registry, layer::SubscriberExt};

#[derive(Debug, thiserror::Error)]
#[error("card declined")]
struct Declined;

fn logger_with_hook(buffer: &SharedBuffer, hook: SpanHook) -> Logger {
    Logger::builder()
        .writer(buffer.clone())
        .level(Level::Debug)
        .hook(hook)
        .build()
}

#[test]
fn test_span_chain_includes_fields() {
    let subscriber = Registry::default().with(SpanFieldsLayer);
    tracing::subscriber::with_default(subscriber, || {
        assert_eq!(current_span_chain(), None);

        let outer = tracing::info_span!("request", id = 7);
        let _outer = outer.enter();
        let inner = tracing::info_span!("query", table = tracing::field::Empty);
        let _inner = inner.enter();
        inner.record("table", "orders");

        assert_eq!(
            current_span_chain().as_deref(),
            Some("request{id=7}:query{table=\"orders\"}")
        );
    });
}

#[test]
fn test_hook_adds_span_field() {
    let buffer = SharedBuffer::new();
    let logger = logger_with_hook(&buffer, SpanHook::default());
    let subscriber = Registry::default().with(SpanFieldsLayer);

    tracing::subscriber::with_default(subscriber, || {
        logger.info("outside");
        let span = tracing::info_span!("checkout");
        let _entered = span.enter();
        logger.info("inside");
        logger.with_field("span", "manual").info("explicit");
    });

    let lines = buffer.lines();
    assert!(!lines[0].contains("span="));
    assert!(lines[1].contains("span=checkout"));
    assert!(lines[2].contains("span=manual"));
}

#[test]
fn test_hook_errors_only() {
    let buffer = SharedBuffer::new();
    let hook = SpanHook {
        errors_only: true,
        ..SpanHook::default()
    };
    let logger = logger_with_hook(&buffer, hook);
    let subscriber = Registry::default().with(SpanFieldsLayer);

    tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!("payment");
        let _entered = span.enter();
        logger.info("attempt");
        logger.with_error(Declined).info("attempt");
    });

    let lines = buffer.lines();
    assert!(!lines[0].contains("span="));
    assert!(lines[1].contains("span=payment"));
}

#[test]
fn test_with_span_captures_at_call_time() {
    let buffer = SharedBuffer::new();
    let logger = Logger::new(buffer.clone());
    let subscriber = Registry::default().with(SpanFieldsLayer);

    let captured = tracing::subscriber::with_default(subscriber, || {
        let span = tracing::info_span!("job", n = 1);
        let _entered = span.enter();
        logger.with_span()
    });
    captured.info("later");

    assert!(buffer.contents().contains("span=\"job{n=1}\""));
}

#[test]
fn test_tracing_sink_forwards_events() {
    let output = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let output = Arc::clone(&output);
        move || OutputWriter(Arc::clone(&output))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let logger = Logger::builder()
        .sink(TracingSink)
        .level(Level::Trace)
        .build();

    tracing::subscriber::with_default(subscriber, || {
        logger.with_field("order", 12).warn("stock low");
        let err: LogError = Declined.into();
        logger.with_error(err).fatal("giving up");
    });

    let output = String::from_utf8_lossy(&output.lock().unwrap()).into_owned();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2, "{output}");
    assert!(lines[0].contains("WARN") && lines[0].contains("stock low"));
    assert!(lines[0].contains("fields=order=12"));
    assert!(lines[1].contains("ERROR") && lines[1].contains("giving up"));
    assert!(lines[1].contains("error=card declined"));
}

struct OutputWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
