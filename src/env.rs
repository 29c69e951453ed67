use std::sync::OnceLock;

use crate::level::Level;

/// Settings read once from the process environment.
#[derive(Debug)]
pub(crate) struct EnvOptions {
    /// `FIELDSCOPE_LEVEL`: threshold of the fallback default logger.
    pub(crate) level: Option<Level>,
    /// `APP_ENV`
    pub(crate) app_env: Option<String>,
    /// `APP_VERSION`
    pub(crate) app_version: Option<String>,
    /// `ALERT_API_KEY`
    pub(crate) alert_api_key: Option<String>,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl EnvOptions {
    pub(crate) fn get() -> &'static Self {
        static FIELDSCOPE_ENV: OnceLock<EnvOptions> = OnceLock::new();

        FIELDSCOPE_ENV.get_or_init(|| {
            let level = non_empty("FIELDSCOPE_LEVEL").and_then(|var| match var.trim().parse() {
                Ok(level) => Some(level),
                Err(error) => {
                    tracing::warn!(%error, "ignoring FIELDSCOPE_LEVEL");
                    None
                }
            });

            EnvOptions {
                level,
                app_env: non_empty("APP_ENV"),
                app_version: non_empty("APP_VERSION"),
                alert_api_key: non_empty("ALERT_API_KEY"),
            }
        })
    }
}
