use std::fmt;

use serde_json::{Map, Number, Value as Json};

use super::{Formatter, field_key};
use crate::{record::Record, value::Value};

/// Formats records as one JSON object per line.
///
/// ```json
/// {"time":"2026-01-02T03:04:05+00:00","level":"info","msg":"handler called","name":"John"}
/// ```
///
/// Numbers stay numbers where JSON can represent them; non-finite floats,
/// 128 bit integers out of range, durations, complex numbers and errors are
/// rendered as strings.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonFormatter {
    /// Leaves out the `time` key.
    pub disable_timestamp: bool,
    /// Indents the output. Each record still ends with a single newline.
    pub pretty: bool,
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Str(v) => Json::String(v.clone()),
        Value::Bool(v) => Json::Bool(*v),
        Value::I64(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::I128(v) => i64::try_from(*v).map_or_else(|_| Json::String(v.to_string()), Json::from),
        Value::U128(v) => u64::try_from(*v).map_or_else(|_| Json::String(v.to_string()), Json::from),
        Value::F32(v) => float(f64::from(*v), value),
        Value::F64(v) => float(*v, value),
        other => Json::String(other.to_string()),
    }
}

fn float(v: f64, original: &Value) -> Json {
    Number::from_f64(v).map_or_else(|| Json::String(original.to_string()), Json::Number)
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record, out: &mut String) -> fmt::Result {
        let mut object = Map::with_capacity(record.fields.len() + 3);
        for (key, value) in &record.fields {
            object.insert(field_key(key).into_owned(), to_json(value));
        }
        if !self.disable_timestamp {
            object.insert("time".into(), Json::String(record.time.to_rfc3339()));
        }
        object.insert("level".into(), Json::String(record.level.as_str().into()));
        object.insert("msg".into(), Json::String(record.message.clone()));

        let object = Json::Object(object);
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&object)
        } else {
            serde_json::to_string(&object)
        };
        out.push_str(&encoded.map_err(|_| fmt::Error)?);
        out.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        level::Level,
        value::{Fields, LogError},
    };

    #[test]
    fn test_json_object() {
        let mut fields = Fields::new();
        fields.insert("msg".into(), Value::from("shadowed"));
        fields.insert("count".into(), Value::from(3u8));
        fields.insert("ratio".into(), Value::from(f64::NAN));
        fields.insert("error".into(), Value::from(LogError::msg("oops")));
        let record = Record {
            level: Level::Error,
            message: "failed".into(),
            fields,
            time: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        };

        let mut out = String::new();
        JsonFormatter::default().format(&record, &mut out).unwrap();
        assert!(out.ends_with('\n'));

        let parsed: Json = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(parsed["level"], "error");
        assert_eq!(parsed["msg"], "failed");
        assert_eq!(parsed["fields.msg"], "shadowed");
        assert_eq!(parsed["count"], 3);
        assert_eq!(parsed["ratio"], "NaN");
        assert_eq!(parsed["error"], "oops");
        assert_eq!(parsed["time"], "2024-05-06T07:08:09+00:00");
    }
}
