//! Forwarding of severe records to an external alerting service.
//!
//! [`AlertHook`] turns each qualifying record into an [`Alert`] and hands it
//! to an [`AlertSink`]. The sink is the integration point with the actual
//! service; it receives everything needed to file a report:
//!
//! - the record's `error` field (or an error built from the message when
//!   there is none), together with stack frames,
//! - a severity and whether delivery should be synchronous,
//! - the user identity taken from the `@user.id`, `@user.name` and
//!   `@user.email` fields,
//! - the remaining fields as metadata under the `Fields` tab.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use fieldscope::{
//!     Level, Logger, LogError, SharedBuffer,
//!     hooks::alert::{Alert, AlertError, AlertHook, AlertOptions, AlertSeverity},
//! };
//!
//! let delivered = Arc::new(Mutex::new(Vec::<Alert>::new()));
//! let sink = {
//!     let delivered = delivered.clone();
//!     move |alert: Alert| -> Result<(), AlertError> {
//!         delivered.lock().unwrap().push(alert);
//!         Ok(())
//!     }
//! };
//! let options = AlertOptions { env: "prod".into(), ..AlertOptions::default() };
//! let logger = Logger::builder()
//!     .writer(SharedBuffer::new())
//!     .hook(AlertHook::new(sink, options))
//!     .build();
//!
//! logger
//!     .with_field("@user.id", "42")
//!     .with_error(LogError::msg("connection reset"))
//!     .error("upstream failed");
//!
//! let delivered = delivered.lock().unwrap();
//! assert_eq!(delivered[0].severity, AlertSeverity::Error);
//! assert_eq!(delivered[0].user.id.as_deref(), Some("42"));
//! assert_eq!(delivered[0].context.as_deref(), Some("upstream failed"));
//! ```

use std::{error::Error, fmt};

use indexmap::IndexMap;

use super::{Hook, HookError};
use crate::{
    env::EnvOptions,
    frames::{FrameProvider, FramedError, StackFrame},
    level::Level,
    record::Record,
    value::{ERROR_KEY, Fields, LogError, Value},
};

/// Name of the metadata tab holding the record's fields.
pub const FIELDS_TAB: &str = "Fields";

const USER_ID_KEY: &str = "@user.id";
const USER_NAME_KEY: &str = "@user.name";
const USER_EMAIL_KEY: &str = "@user.email";

/// Fields never copied into alert metadata.
const EXCLUDED_METADATA_KEYS: [&str; 2] = ["blob", ERROR_KEY];

/// How urgent an alert is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Something looks wrong.
    Warning,
    /// Something is broken.
    Error,
}

impl AlertSeverity {
    /// Maps a record level to an alert severity, together with whether the
    /// alert must be delivered before returning.
    pub fn for_level(level: Level) -> (Self, bool) {
        match level {
            Level::Warn => (AlertSeverity::Warning, false),
            Level::Error => (AlertSeverity::Error, false),
            Level::Fatal | Level::Panic => (AlertSeverity::Error, true),
            Level::Info | Level::Debug | Level::Trace => (AlertSeverity::Info, false),
        }
    }
}

/// The user an alert is attributed to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertUser {
    /// Taken from the `@user.id` field.
    pub id: Option<String>,
    /// Taken from the `@user.name` field.
    pub name: Option<String>,
    /// Taken from the `@user.email` field.
    pub email: Option<String>,
}

impl AlertUser {
    /// Returns `true` if no part of the identity is known.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.email.is_none()
    }

    /// Moves the `@user.*` string fields out of `fields`.
    ///
    /// Fields under those keys that are not strings are left in place.
    pub fn extract(fields: &mut Fields) -> Self {
        let mut take = |key: &str| {
            if !matches!(fields.get(key), Some(Value::Str(_))) {
                return None;
            }
            match fields.shift_remove(key) {
                Some(Value::Str(value)) => Some(value),
                _ => None,
            }
        };
        Self {
            id: take(USER_ID_KEY),
            name: take(USER_NAME_KEY),
            email: take(USER_EMAIL_KEY),
        }
    }
}

/// Everything an [`AlertSink`] needs to file one report.
#[derive(Clone, Debug)]
pub struct Alert {
    /// The reported error.
    pub error: LogError,
    /// The stack the error is attributed to, innermost first.
    pub frames: Vec<StackFrame>,
    /// How urgent the alert is.
    pub severity: AlertSeverity,
    /// Whether the alert should be delivered before the logging call returns.
    pub sync: bool,
    /// Free-text context. Set to the record's message when the record carried
    /// an error.
    pub context: Option<String>,
    /// The user the alert is attributed to.
    pub user: AlertUser,
    /// Metadata tabs. The record's fields live under [`FIELDS_TAB`].
    pub metadata: IndexMap<String, Fields>,
    /// The deployment environment the alert comes from.
    pub release_stage: String,
    /// The application version, if known.
    pub app_version: Option<String>,
}

/// Error returned by an [`AlertSink`] that failed to deliver an alert.
pub struct AlertError(LogError);

impl AlertError {
    /// Wraps the underlying cause.
    pub fn new(cause: impl Into<LogError>) -> Self {
        Self(cause.into())
    }

    /// Creates an error from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(LogError::msg(message))
    }
}

impl fmt::Debug for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AlertError").field(&self.0).finish()
    }
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert delivery failed: {}", self.0)
    }
}

impl Error for AlertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_error())
    }
}

/// Delivers alerts to an external service.
pub trait AlertSink: 'static + Send + Sync {
    /// Sends one alert.
    fn notify(&self, alert: Alert) -> Result<(), AlertError>;
}

impl<F> AlertSink for F
where
    F: Fn(Alert) -> Result<(), AlertError> + 'static + Send + Sync,
{
    fn notify(&self, alert: Alert) -> Result<(), AlertError> {
        self(alert)
    }
}

/// Settings for an [`AlertHook`].
#[derive(Clone, Debug)]
pub struct AlertOptions {
    /// Levels the hook fires for.
    pub levels: Vec<Level>,
    /// The current deployment environment.
    pub env: String,
    /// The application version.
    pub app_version: Option<String>,
    /// Credential for the alerting service, passed through to sinks that
    /// need one.
    pub api_key: Option<String>,
    /// Environments in which alerts are delivered. Everywhere else the hook
    /// only strips the user fields.
    pub enabled_envs: Vec<String>,
    /// Function path prefixes of the application's own code. Matching
    /// frames are marked as in-project. A trailing `*` is ignored.
    pub packages: Vec<String>,
}

impl AlertOptions {
    /// The levels alerted on by default.
    pub const DEFAULT_LEVELS: [Level; 4] = [Level::Panic, Level::Fatal, Level::Error, Level::Warn];

    /// Default options, with the environment, version and key taken from the
    /// `APP_ENV`, `APP_VERSION` and `ALERT_API_KEY` variables.
    ///
    /// # Environment Variables
    ///
    /// - `APP_ENV` - The deployment environment. Defaults to `local`.
    /// - `APP_VERSION` - The application version.
    /// - `ALERT_API_KEY` - Credential for the alerting service.
    pub fn from_env() -> Self {
        let env = EnvOptions::get();
        Self {
            env: env.app_env.clone().unwrap_or_else(|| String::from("local")),
            app_version: env.app_version.clone(),
            api_key: env.alert_api_key.clone(),
            ..Self::default()
        }
    }

    /// Returns `true` if alerts are delivered in the current environment.
    pub fn is_enabled(&self) -> bool {
        self.enabled_envs.iter().any(|env| *env == self.env)
    }

    fn is_project_frame(&self, frame: &StackFrame) -> bool {
        self.packages.iter().any(|package| {
            let prefix = package.trim_end_matches('*');
            !prefix.is_empty() && frame.function.starts_with(prefix)
        })
    }
}

impl Default for AlertOptions {
    fn default() -> Self {
        Self {
            levels: Self::DEFAULT_LEVELS.to_vec(),
            env: String::from("local"),
            app_version: None,
            api_key: None,
            enabled_envs: ["prod", "staging", "test"].map(String::from).to_vec(),
            packages: Vec::new(),
        }
    }
}

/// A [`Hook`] forwarding records to an [`AlertSink`].
///
/// Delivery failures are reported as `tracing` warnings and never reach the
/// logging call.
pub struct AlertHook<S> {
    options: AlertOptions,
    sink: S,
    frames: Option<Box<dyn FrameProvider>>,
}

impl<S: AlertSink> AlertHook<S> {
    /// Creates a hook delivering to `sink`.
    pub fn new(sink: S, options: AlertOptions) -> Self {
        Self {
            options,
            sink,
            frames: None,
        }
    }

    /// Captures stack frames with `provider` for errors that do not carry
    /// their own.
    pub fn with_frame_provider(mut self, provider: impl FrameProvider) -> Self {
        self.frames = Some(Box::new(provider));
        self
    }

    /// The hook's settings.
    pub fn options(&self) -> &AlertOptions {
        &self.options
    }

    fn capture_frames(&self) -> Vec<StackFrame> {
        self.frames
            .as_ref()
            .map(|provider| provider.frames())
            .unwrap_or_default()
    }

    /// Builds the alert for `record`, moving the user fields out of it.
    pub fn build_alert(&self, record: &mut Record) -> Alert {
        let (error, mut frames, context) = match record.error() {
            Some(error) => {
                let frames = match error.downcast_ref::<FramedError>() {
                    Some(framed) => framed.frames().to_vec(),
                    None => self.capture_frames(),
                };
                (error.clone(), frames, Some(record.message.clone()))
            }
            None => (LogError::msg(&record.message), self.capture_frames(), None),
        };
        for frame in &mut frames {
            frame.in_project |= self.options.is_project_frame(frame);
        }

        let (severity, sync) = AlertSeverity::for_level(record.level);
        let user = AlertUser::extract(&mut record.fields);

        let mut metadata = IndexMap::new();
        if !record.fields.is_empty() {
            let tab: Fields = record
                .fields
                .iter()
                .filter(|(key, _)| !EXCLUDED_METADATA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            metadata.insert(FIELDS_TAB.to_owned(), tab);
        }

        Alert {
            error,
            frames,
            severity,
            sync,
            context,
            user,
            metadata,
            release_stage: self.options.env.clone(),
            app_version: self.options.app_version.clone(),
        }
    }
}

impl<S: AlertSink> Hook for AlertHook<S> {
    fn levels(&self) -> &[Level] {
        &self.options.levels
    }

    fn fire(&self, record: &mut Record) -> Result<(), HookError> {
        let alert = self.build_alert(record);
        if !self.options.is_enabled() {
            return Ok(());
        }
        if let Err(error) = self.sink.notify(alert) {
            tracing::warn!(%error, env = %self.options.env, "failed to deliver alert");
        }
        Ok(())
    }
}

impl<S> fmt::Debug for AlertHook<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertHook")
            .field("options", &self.options)
            .field("frames", &self.frames.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;
    use crate::value::fields;

    fn record(level: Level, fields: Fields) -> Record {
        Record {
            level,
            message: String::from("something failed"),
            fields,
            time: Utc::now(),
        }
    }

    fn collecting() -> (Arc<Mutex<Vec<Alert>>>, impl AlertSink) {
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let alerts = alerts.clone();
            move |alert: Alert| -> Result<(), AlertError> {
                alerts.lock().unwrap().push(alert);
                Ok(())
            }
        };
        (alerts, sink)
    }

    fn enabled() -> AlertOptions {
        AlertOptions {
            env: String::from("test"),
            ..AlertOptions::default()
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(AlertSeverity::for_level(Level::Warn), (AlertSeverity::Warning, false));
        assert_eq!(AlertSeverity::for_level(Level::Error), (AlertSeverity::Error, false));
        assert_eq!(AlertSeverity::for_level(Level::Fatal), (AlertSeverity::Error, true));
        assert_eq!(AlertSeverity::for_level(Level::Panic), (AlertSeverity::Error, true));
        assert_eq!(AlertSeverity::for_level(Level::Info), (AlertSeverity::Info, false));
    }

    #[test]
    fn test_user_and_metadata_extraction() {
        let (alerts, sink) = collecting();
        let hook = AlertHook::new(sink, enabled());
        let mut record = record(
            Level::Error,
            fields([
                ("@user.id", Value::from("u-1")),
                ("@user.email", Value::from("a@example.com")),
                ("@user.name", Value::from(7)),
                ("blob", Value::from("binary")),
                ("error", Value::from(LogError::msg("oops"))),
                ("request", Value::from("r-9")),
            ]),
        );

        hook.fire(&mut record).unwrap();

        assert!(!record.fields.contains_key("@user.id"));
        assert!(!record.fields.contains_key("@user.email"));
        assert!(record.fields.contains_key("@user.name"));

        let alerts = alerts.lock().unwrap();
        let alert = &alerts[0];
        assert_eq!(alert.user.id.as_deref(), Some("u-1"));
        assert_eq!(alert.user.email.as_deref(), Some("a@example.com"));
        assert_eq!(alert.user.name, None);
        assert_eq!(alert.error.to_string(), "oops");
        assert_eq!(alert.context.as_deref(), Some("something failed"));

        let tab = &alert.metadata[FIELDS_TAB];
        assert!(tab.contains_key("request"));
        assert!(tab.contains_key("@user.name"));
        assert!(!tab.contains_key("blob"));
        assert!(!tab.contains_key("error"));
    }

    #[test]
    fn test_message_becomes_error_without_context() {
        let (alerts, sink) = collecting();
        let hook = AlertHook::new(sink, enabled())
            .with_frame_provider(|| vec![StackFrame::default()]);

        hook.fire(&mut record(Level::Fatal, Fields::new())).unwrap();

        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts[0].error.to_string(), "something failed");
        assert_eq!(alerts[0].context, None);
        assert!(alerts[0].sync);
        assert_eq!(alerts[0].frames.len(), 1);
        assert!(alerts[0].metadata.is_empty());
    }

    #[test]
    fn test_framed_error_keeps_its_frames() {
        let (alerts, sink) = collecting();
        let options = AlertOptions {
            packages: vec![String::from("app::*")],
            ..enabled()
        };
        let hook = AlertHook::new(sink, options).with_frame_provider(Vec::<StackFrame>::new);

        let original = StackFrame {
            function: String::from("app::load"),
            ..StackFrame::default()
        };
        let err = FramedError::new(LogError::msg("boom"), vec![original]);
        let mut record = record(Level::Error, fields([("error", Value::from(LogError::from(err)))]));
        hook.fire(&mut record).unwrap();

        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts[0].frames.len(), 1);
        assert_eq!(alerts[0].frames[0].function, "app::load");
        assert!(alerts[0].frames[0].in_project);
    }

    #[test]
    fn test_disabled_env_strips_user_but_skips_delivery() {
        let (alerts, sink) = collecting();
        let hook = AlertHook::new(sink, AlertOptions::default());
        let mut record = record(Level::Error, fields([("@user.id", Value::from("u-1"))]));

        hook.fire(&mut record).unwrap();

        assert!(record.fields.is_empty());
        assert!(alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_delivery_failure_is_swallowed() {
        let hook = AlertHook::new(
            |_: Alert| -> Result<(), AlertError> { Err(AlertError::msg("network down")) },
            enabled(),
        );
        assert!(hook.fire(&mut record(Level::Warn, Fields::new())).is_ok());
    }
}
