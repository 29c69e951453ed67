use std::{
    io,
    sync::{Arc, Mutex},
};

use fieldscope::{
    Level, Logger, Sink,
    format::TextFormatter,
    hooks::HookError,
    record::Record,
};

struct BrokenPipe;

impl Sink for BrokenPipe {
    fn write(&self, _record: &Record, _line: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_warnings(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = {
        let captured = captured.clone();
        move || captured.clone()
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[test]
fn test_sink_failure_is_reported_not_returned() {
    let logger = Logger::builder().sink(BrokenPipe).build();
    let output = capture_warnings(|| logger.error("lost"));
    assert!(output.contains("failed to write log record"), "{output}");
    assert!(output.contains("pipe closed"), "{output}");
}

#[test]
fn test_hook_failure_still_writes_record() {
    let buffer = fieldscope::SharedBuffer::new();
    let logger = Logger::builder()
        .writer(buffer.clone())
        .level(Level::Debug)
        .hook(|_: &mut Record| -> Result<(), HookError> { Err(HookError::msg("quota")) })
        .build();

    let output = capture_warnings(|| logger.info("kept"));
    assert!(output.contains("log hook failed"), "{output}");
    assert!(buffer.contents().contains("msg=kept"));
}

#[test]
fn test_unrenderable_timestamp_format_is_reported() {
    let buffer = fieldscope::SharedBuffer::new();
    let logger = Logger::builder()
        .writer(buffer.clone())
        .formatter(TextFormatter {
            timestamp_format: Some("%Q"),
            ..TextFormatter::DEFAULT
        })
        .build();

    let output = capture_warnings(|| {
        logger.info("hello");
        let _guard = logger.clone().on_drop(Level::Info, "done");
    });
    assert!(output.contains("failed to format log record"), "{output}");
    assert!(buffer.contents().is_empty());
}
