//! Destinations for formatted records.

use std::{
    fmt, io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::record::Record;

/// Where formatted records end up.
///
/// A sink receives both the structured record and the line produced by the
/// logger's formatter; writers only care about the bytes, adapters such as
/// a `tracing` bridge can use the record instead.
pub trait Sink: 'static + Send + Sync {
    /// Writes one record.
    fn write(&self, record: &Record, line: &[u8]) -> io::Result<()>;
}

/// A [`Sink`] writing to any [`io::Write`].
///
/// Writes are serialized by an internal lock.
pub struct WriterSink<W>(Mutex<W>);

impl<W: io::Write + Send + 'static> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self(Mutex::new(writer))
    }
}

impl<W: io::Write + Send + 'static> Sink for WriterSink<W> {
    fn write(&self, _record: &Record, line: &[u8]) -> io::Result<()> {
        let mut writer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }
}

/// A sink that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct Discard;

impl Sink for Discard {
    fn write(&self, _record: &Record, _line: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// An in-memory, cloneable writer.
///
/// Clones share the same buffer, which makes it convenient for capturing the
/// output of a logger in tests.
///
/// ```rust
/// use fieldscope::{Logger, SharedBuffer};
///
/// let buffer = SharedBuffer::new();
/// Logger::new(buffer.clone()).info("hello");
/// assert!(buffer.contents().contains("msg=hello"));
/// ```
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The buffered output, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// The buffered output split into lines, without the trailing empty line.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedBuffer").field(&self.contents()).finish()
    }
}
