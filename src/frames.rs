//! Stack frames attached to alerts.
//!
//! The crate does not walk the stack itself. A [`FrameProvider`] is plugged
//! into the alert hook instead; the `fieldscope-backtrace` crate ships one
//! based on the `backtrace` crate.

use std::{error::Error, fmt};

use crate::value::LogError;

/// A single resolved stack frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// The demangled function name, without the trailing hash.
    pub function: String,
    /// The source file, if known.
    pub file: Option<String>,
    /// The line number, if known.
    pub line: Option<u32>,
    /// Whether the frame belongs to the application rather than a dependency.
    pub in_project: bool,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.function)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " - {file}:{line}"),
            (Some(file), None) => write!(f, " - {file}"),
            _ => Ok(()),
        }
    }
}

/// Captures the stack of the calling thread.
pub trait FrameProvider: 'static + Send + Sync {
    /// Returns the frames of the current stack, innermost first.
    fn frames(&self) -> Vec<StackFrame>;
}

impl<F> FrameProvider for F
where
    F: Fn() -> Vec<StackFrame> + 'static + Send + Sync,
{
    fn frames(&self) -> Vec<StackFrame> {
        self()
    }
}

/// An error that carries the stack it was created on.
///
/// When a record's `error` field holds a `FramedError`, the alert hook keeps
/// these frames instead of capturing the stack at the logging call site.
///
/// ```rust
/// use fieldscope::{FramedError, LogError, StackFrame};
///
/// let frame = StackFrame { function: "app::load".into(), ..Default::default() };
/// let err: LogError = FramedError::new(LogError::msg("boom"), vec![frame]).into();
/// assert_eq!(err.to_string(), "boom");
/// assert_eq!(err.downcast_ref::<FramedError>().unwrap().frames().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct FramedError {
    error: LogError,
    frames: Vec<StackFrame>,
}

impl FramedError {
    /// Pairs `error` with explicit frames.
    pub fn new(error: impl Into<LogError>, frames: Vec<StackFrame>) -> Self {
        Self {
            error: error.into(),
            frames,
        }
    }

    /// Pairs `error` with the current stack as reported by `provider`.
    pub fn capture(error: impl Into<LogError>, provider: &dyn FrameProvider) -> Self {
        Self::new(error, provider.frames())
    }

    /// The wrapped error.
    pub fn error(&self) -> &LogError {
        &self.error
    }

    /// The frames recorded for the error.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

impl fmt::Display for FramedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl Error for FramedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.error.as_error().source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_display() {
        let frame = StackFrame {
            function: "app::main".into(),
            file: Some("src/main.rs".into()),
            line: Some(12),
            in_project: true,
        };
        assert_eq!(frame.to_string(), "app::main - src/main.rs:12");
        let bare = StackFrame {
            function: "std::rt::lang_start".into(),
            ..Default::default()
        };
        assert_eq!(bare.to_string(), "std::rt::lang_start");
    }

    #[test]
    fn test_closure_provider() {
        let provider = || vec![StackFrame::default(); 2];
        let framed = FramedError::capture(LogError::msg("x"), &provider);
        assert_eq!(framed.frames().len(), 2);
    }
}
