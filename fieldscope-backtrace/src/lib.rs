#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Stack frame capture for fieldscope alerts.
//!
//! The alert hook in `fieldscope` attaches the stack of the logging call
//! site, or of the place an error was created, to every alert. It does not
//! walk the stack itself: this crate provides the [`FrameProvider`] that
//! does, on top of the `backtrace` crate.
//!
//! # Quick Start
//!
//! ```rust
//! use fieldscope::hooks::alert::{Alert, AlertError, AlertHook, AlertOptions};
//! use fieldscope_backtrace::BacktraceProvider;
//!
//! let sink = |alert: Alert| -> Result<(), AlertError> {
//!     println!("{} frames", alert.frames.len());
//!     Ok(())
//! };
//! let hook = AlertHook::new(sink, AlertOptions::from_env())
//!     .with_frame_provider(BacktraceProvider::new_from_env());
//! ```
//!
//! Errors can also carry the stack they were created on, so alerts point at
//! the failure rather than at the logging statement:
//!
//! ```rust
//! use fieldscope::{FramedError, LogError};
//! use fieldscope_backtrace::FramesExt;
//!
//! fn load() -> Result<(), LogError> {
//!     Err(LogError::msg("disk full"))
//! }
//!
//! let err: FramedError = load().with_frames().unwrap_err();
//! assert_eq!(err.to_string(), "disk full");
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - Disables filtering and reports full paths
//! - `FIELDSCOPE_BACKTRACE` - Comma-separated options:
//!   - `full_paths` - Report full file paths instead of shortened ones
//!   - `off` - Capture no frames at all
//!
//! # Path privacy
//!
//! Shortened paths only hide prefixes that are recognized (the Rust sources
//! and the Cargo registry). Application paths are reported as they appear in
//! the debug information; use `--remap-path-prefix` when building releases
//! if that is a concern.

use std::{panic::Location, sync::OnceLock};

use fieldscope::{FrameProvider, FramedError, LogError, StackFrame};

/// Configuration for filtering frames from certain crates.
///
/// ```rust
/// use fieldscope_backtrace::BacktraceFilter;
///
/// let filter = BacktraceFilter {
///     // Hide framework frames in the middle
///     skipped_middle_crates: &["tokio", "hyper", "tower"],
///     // Report only the most relevant 10 frames
///     max_entry_count: 10,
///     ..BacktraceFilter::DEFAULT
/// };
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceFilter {
    /// Crates whose frames are hidden when they appear at the top of the
    /// stack, before the first reported frame.
    pub skipped_initial_crates: &'static [&'static str],
    /// Crates whose frames are collapsed when they appear in the middle of
    /// the stack. A run of a single frame is kept.
    pub skipped_middle_crates: &'static [&'static str],
    /// Crates whose frames are hidden when they appear at the bottom of the
    /// stack.
    pub skipped_final_crates: &'static [&'static str],
    /// Maximum number of frames to report.
    pub max_entry_count: usize,
    /// Whether to report full file paths.
    pub show_full_path: bool,
}

impl BacktraceFilter {
    /// Default filter settings.
    pub const DEFAULT: Self = Self {
        skipped_initial_crates: &[
            "backtrace",
            "fieldscope",
            "fieldscope-backtrace",
            "core",
            "std",
            "alloc",
        ],
        skipped_middle_crates: &["std", "core", "alloc", "tokio"],
        skipped_final_crates: &["std", "core", "alloc", "tokio"],
        max_entry_count: 20,
        show_full_path: false,
    };

    /// A filter that reports every frame.
    pub const UNFILTERED: Self = Self {
        skipped_initial_crates: &[],
        skipped_middle_crates: &[],
        skipped_final_crates: &[],
        max_entry_count: usize::MAX,
        show_full_path: true,
    };
}

impl Default for BacktraceFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
struct BacktraceEnvOptions {
    rust_backtrace_full: bool,
    show_full_path: bool,
    disabled: bool,
}

impl BacktraceEnvOptions {
    fn get() -> &'static Self {
        static BACKTRACE_FLAGS: OnceLock<BacktraceEnvOptions> = OnceLock::new();

        BACKTRACE_FLAGS.get_or_init(|| {
            let rust_backtrace_full =
                std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut show_full_path = rust_backtrace_full;
            let mut disabled = false;
            if let Some(var) = std::env::var_os("FIELDSCOPE_BACKTRACE") {
                for v in var.to_string_lossy().split(',') {
                    if v.eq_ignore_ascii_case("full_paths") {
                        show_full_path = true;
                    } else if v.eq_ignore_ascii_case("off") {
                        disabled = true;
                    }
                }
            }
            BacktraceEnvOptions {
                rust_backtrace_full,
                show_full_path,
                disabled,
            }
        })
    }
}

/// A [`FrameProvider`] walking the current stack with the `backtrace` crate.
///
/// ```rust
/// use fieldscope::FrameProvider;
/// use fieldscope_backtrace::{BacktraceFilter, BacktraceProvider};
///
/// let provider = BacktraceProvider {
///     filter: BacktraceFilter { max_entry_count: 5, ..BacktraceFilter::DEFAULT },
///     enabled: true,
/// };
/// assert!(provider.frames().len() <= 5);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceProvider {
    /// Filtering applied to every capture.
    pub filter: BacktraceFilter,
    /// When false, no frames are captured.
    pub enabled: bool,
}

impl BacktraceProvider {
    /// Default settings, ignoring the environment.
    pub const DEFAULT: Self = Self {
        filter: BacktraceFilter::DEFAULT,
        enabled: true,
    };

    /// Creates a provider configured from `RUST_BACKTRACE` and
    /// `FIELDSCOPE_BACKTRACE`.
    pub fn new_from_env() -> Self {
        let env_options = BacktraceEnvOptions::get();
        Self {
            filter: if env_options.rust_backtrace_full {
                BacktraceFilter {
                    show_full_path: env_options.show_full_path,
                    ..BacktraceFilter::UNFILTERED
                }
            } else {
                BacktraceFilter {
                    show_full_path: env_options.show_full_path,
                    ..BacktraceFilter::DEFAULT
                }
            },
            enabled: !env_options.disabled,
        }
    }
}

impl Default for BacktraceProvider {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FrameProvider for BacktraceProvider {
    fn frames(&self) -> Vec<StackFrame> {
        if self.enabled {
            capture(&self.filter)
        } else {
            Vec::new()
        }
    }
}

struct Candidate {
    frame: StackFrame,
    crate_name: Option<String>,
}

/// Captures the current stack, innermost frame first.
///
/// Frames without a symbol name or file are ignored. Frames from the Rust
/// sources or the Cargo registry are reported with `in_project` unset.
pub fn capture(filter: &BacktraceFilter) -> Vec<StackFrame> {
    let mut initial_filtering = !filter.skipped_initial_crates.is_empty();
    let mut entries: Vec<Candidate> = Vec::new();

    // A run of frames from a skipped middle crate. Its first frame is kept
    // aside and only reported if the run turns out to be a single frame.
    let mut omitted_crate: Option<&'static str> = None;
    let mut omitted_first: Option<Candidate> = None;
    let mut omitted_count = 0usize;

    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            let (Some(sym), Some(filename)) = (symbol.name(), symbol.filename_raw()) else {
                return;
            };

            if entries.len() >= filter.max_entry_count {
                return;
            }

            let path = FramePath::new(&filename.to_str_lossy());

            if initial_filtering {
                if let Some(crate_name) = &path.crate_name
                    && filter.skipped_initial_crates.contains(&crate_name.as_str())
                {
                    return;
                }
                initial_filtering = false;
            }

            if let Some(crate_name) = &path.crate_name
                && omitted_crate == Some(crate_name.as_str())
            {
                omitted_count += 1;
                return;
            }

            if omitted_crate.take().is_some() {
                if let Some(first) = omitted_first.take()
                    && omitted_count == 1
                {
                    entries.push(first);
                }
                omitted_first = None;
                omitted_count = 0;
            }

            let candidate = Candidate {
                frame: StackFrame {
                    function: format!("{sym:#}"),
                    file: Some(path.display(filter.show_full_path).to_owned()),
                    line: symbol.lineno(),
                    in_project: path.crate_name.is_none(),
                },
                crate_name: path.crate_name,
            };

            if let Some(crate_name) = &candidate.crate_name
                && let Some(skipped) = filter
                    .skipped_middle_crates
                    .iter()
                    .find(|&&skipped| skipped == crate_name)
            {
                omitted_crate = Some(*skipped);
                omitted_first = Some(candidate);
                omitted_count = 1;
                return;
            }

            entries.push(candidate);
        });

        true
    });

    if omitted_count == 1
        && let Some(first) = omitted_first
    {
        entries.push(first);
    }

    while let Some(last) = entries.last() {
        let skip = last
            .crate_name
            .as_deref()
            .is_some_and(|name| filter.skipped_final_crates.contains(&name))
            || last.frame.function == "__libc_start_call_main"
            || last.frame.function == "__libc_start_main_impl";
        if !skip {
            break;
        }
        entries.pop();
    }

    entries.into_iter().map(|entry| entry.frame).collect()
}

const fn source_matcher(location: &'static Location<'static>) -> Option<(&'static str, usize)> {
    let file = location.file();

    let Some(prefix_len) = file.len().checked_sub("/src/lib.rs".len()) else {
        return None;
    };

    let (prefix, suffix) = file.split_at(prefix_len);
    if std::path::MAIN_SEPARATOR == '/' {
        assert!(suffix.eq_ignore_ascii_case("/src/lib.rs"));
    } else {
        assert!(suffix.eq_ignore_ascii_case(r#"/src\lib.rs"#));
    }

    let (matcher_prefix, _) = file.split_at(prefix_len + 4);

    let mut splitter_prefix = prefix;
    while !splitter_prefix.is_empty() {
        let (new_prefix, last_char) = splitter_prefix.split_at(splitter_prefix.len() - 1);
        splitter_prefix = new_prefix;
        if last_char.eq_ignore_ascii_case(std::path::MAIN_SEPARATOR_STR) {
            break;
        }
    }

    Some((matcher_prefix, splitter_prefix.len()))
}

const BACKTRACE_CRATE_MATCHER: Option<(&str, usize)> = source_matcher(Location::caller());
const FIELDSCOPE_MATCHER: Option<(&str, usize)> =
    source_matcher(fieldscope::__private::FIELDSCOPE_LOCATION);

#[derive(Debug, PartialEq, Eq)]
struct FramePath {
    raw_path: String,
    crate_name: Option<String>,
    // Offset of the part of `raw_path` worth showing when paths are shortened.
    short_start: Option<usize>,
}

impl FramePath {
    fn new(path: &str) -> Self {
        static REGEXES: OnceLock<Option<[regex::Regex; 2]>> = OnceLock::new();
        let regexes = REGEXES.get_or_init(|| {
            Some([
                // Matches Rust standard library paths:
                // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
                // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/.*$",
                )
                .ok()?,
                // Matches Cargo registry paths:
                // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .ok()?,
            ])
        });

        if let Some([std_regex, registry_regex]) = regexes {
            for regex in [std_regex, registry_regex] {
                if let Some(crate_capture) = regex.captures(path).and_then(|c| c.get(1)) {
                    return Self {
                        raw_path: path.to_owned(),
                        crate_name: Some(crate_capture.as_str().to_owned()),
                        short_start: Some(crate_capture.start()),
                    };
                }
            }
        }

        for (matcher, crate_name) in [
            (FIELDSCOPE_MATCHER, "fieldscope"),
            (BACKTRACE_CRATE_MATCHER, "fieldscope-backtrace"),
        ] {
            if let Some((matcher_prefix, splitter_prefix_len)) = matcher
                && path.starts_with(matcher_prefix)
            {
                return Self {
                    raw_path: path.to_owned(),
                    crate_name: Some(crate_name.to_owned()),
                    short_start: Some(splitter_prefix_len + 1),
                };
            }
        }

        Self {
            raw_path: path.to_owned(),
            crate_name: None,
            short_start: None,
        }
    }

    fn display(&self, full: bool) -> &str {
        match self.short_start {
            Some(start) if !full => self.raw_path.get(start..).unwrap_or(&self.raw_path),
            _ => &self.raw_path,
        }
    }
}

/// Extension trait pairing the error of a `Result` with the current stack.
///
/// ```rust
/// use fieldscope::{FramedError, LogError};
/// use fieldscope_backtrace::{BacktraceFilter, FramesExt};
///
/// let result: Result<(), LogError> = Err(LogError::msg("timeout"));
/// let filter = BacktraceFilter { max_entry_count: 3, ..BacktraceFilter::DEFAULT };
/// let err: FramedError = result.with_frames_filtered(&filter).unwrap_err();
/// assert!(err.frames().len() <= 3);
/// ```
pub trait FramesExt<T>: Sized {
    /// Captures the stack with the default filter if `self` is an error.
    fn with_frames(self) -> Result<T, FramedError> {
        self.with_frames_filtered(&BacktraceFilter::DEFAULT)
    }

    /// Captures the stack with `filter` if `self` is an error.
    fn with_frames_filtered(self, filter: &BacktraceFilter) -> Result<T, FramedError>;
}

impl<T, E: Into<LogError>> FramesExt<T> for Result<T, E> {
    fn with_frames_filtered(self, filter: &BacktraceFilter) -> Result<T, FramedError> {
        self.map_err(|err| FramedError::new(err, capture(filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct Quota;

    #[test]
    fn test_std_paths_are_recognized() {
        let path = FramePath::new(
            "/rustc/0123456789abcdef0123456789abcdef01234567/library/std/src/panicking.rs",
        );
        assert_eq!(path.crate_name.as_deref(), Some("std"));
        assert_eq!(path.display(false), "std/src/panicking.rs");
        assert!(path.display(true).starts_with("/rustc/"));
    }

    #[test]
    fn test_registry_paths_are_recognized() {
        let path = FramePath::new(
            "/home/user/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/indexmap-2.12.1/src/map/core/entry.rs",
        );
        assert_eq!(path.crate_name.as_deref(), Some("indexmap"));
        assert_eq!(path.display(false), "indexmap-2.12.1/src/map/core/entry.rs");
    }

    #[test]
    fn test_unknown_paths_are_kept() {
        let path = FramePath::new("/build/app/src/main.rs");
        assert_eq!(path.crate_name, None);
        assert_eq!(path.display(false), "/build/app/src/main.rs");
    }

    #[test]
    fn test_max_entry_count_is_honored() {
        let filter = BacktraceFilter {
            max_entry_count: 2,
            ..BacktraceFilter::UNFILTERED
        };
        assert!(capture(&filter).len() <= 2);
    }

    #[test]
    fn test_disabled_provider_captures_nothing() {
        let provider = BacktraceProvider {
            enabled: false,
            ..BacktraceProvider::DEFAULT
        };
        assert!(provider.frames().is_empty());
    }

    #[test]
    fn test_with_frames_keeps_error() {
        let result: Result<(), Quota> = Err(Quota);
        let err = result.with_frames().unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(err.error().downcast_ref::<Quota>().is_some());

        let ok: Result<u8, Quota> = Ok(4);
        assert_eq!(ok.with_frames().unwrap(), 4);
    }
}
