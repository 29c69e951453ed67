use std::{
    borrow::Cow,
    fmt::{self, Write},
};

use super::{Formatter, field_key};
use crate::{record::Record, value::Value};

/// Formats records as `key=value` pairs.
///
/// The fixed keys come first (`time`, `level`, `msg`), followed by the
/// record's fields. Values containing anything other than ASCII letters,
/// digits and `-._/@^+` are quoted.
///
/// ```text
/// time="2026-01-02T03:04:05Z" level=info msg="handler called" name=John pre=true
/// ```
#[derive(Copy, Clone, Debug)]
pub struct TextFormatter {
    /// Leaves out the `time` key.
    pub disable_timestamp: bool,
    /// Keeps fields in insertion order instead of sorting them by key.
    pub disable_sorting: bool,
    /// Quotes empty values, so that `key=` becomes `key=""`.
    pub quote_empty_fields: bool,
    /// `chrono` format string for the timestamp. `None` means RFC 3339.
    pub timestamp_format: Option<&'static str>,
}

impl TextFormatter {
    /// Default formatter settings.
    pub const DEFAULT: Self = Self {
        disable_timestamp: false,
        disable_sorting: false,
        quote_empty_fields: false,
        timestamp_format: None,
    };

    fn needs_quoting(&self, text: &str) -> bool {
        if text.is_empty() {
            return self.quote_empty_fields;
        }
        !text.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
        })
    }

    fn append_value(&self, out: &mut String, text: &str) -> fmt::Result {
        if self.needs_quoting(text) {
            write!(out, "{text:?}")
        } else {
            out.write_str(text)
        }
    }

    fn append_pair(&self, out: &mut String, key: &str, text: &str) -> fmt::Result {
        if !out.is_empty() {
            out.push(' ');
        }
        out.write_str(key)?;
        out.push('=');
        self.append_value(out, text)
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record, out: &mut String) -> fmt::Result {
        let mut line = String::new();

        if !self.disable_timestamp {
            let mut time = String::new();
            match self.timestamp_format {
                Some(format) => write!(time, "{}", record.time.format(format))?,
                None => time.push_str(&record.time.to_rfc3339()),
            }
            self.append_pair(&mut line, "time", &time)?;
        }
        self.append_pair(&mut line, "level", record.level.as_str())?;
        self.append_pair(&mut line, "msg", &record.message)?;

        let mut fields: Vec<(Cow<'_, str>, &Value)> = record
            .fields
            .iter()
            .map(|(key, value)| (field_key(key), value))
            .collect();
        if !self.disable_sorting {
            fields.sort_by(|a, b| a.0.cmp(&b.0));
        }
        for (key, value) in fields {
            self.append_pair(&mut line, &key, &value.to_string())?;
        }

        out.push_str(&line);
        out.push('\n');
        Ok(())
    }
}
