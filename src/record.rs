use crate::severity::Severity;
use serde_json::{Map, Value};

/// One structured log line before encoding.
///
/// Field order is insertion order and is observable in the emitted JSON:
/// the line layout is `{"level": <int>, "time": <epoch ms>, ...fields,
/// "msg": "..."}`.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Severity,
    pub msg: String,
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: Severity, msg: impl Into<String>) -> LogRecord {
        LogRecord {
            level,
            msg: msg.into(),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: Value) -> LogRecord {
        self.fields.insert(key.into(), value);
        self
    }

    /// Insert only when the value is present; absent fields are omitted
    /// from the line entirely, never emitted as `null`.
    pub fn maybe_field(self, key: impl Into<String>, value: Option<Value>) -> LogRecord {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Full line value with the timestamp stamped in.
    pub fn to_line_value(&self, time_ms: i64) -> Value {
        let mut out = Map::new();
        out.insert("level".to_string(), Value::Number(self.level.value().into()));
        out.insert("time".to_string(), Value::Number(time_ms.into()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        out.insert("msg".to_string(), Value::String(self.msg.clone()));
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_layout_and_field_order() {
        let record = LogRecord::new(Severity::Info, "request-completed")
            .field("req", json!({"id": "r1"}))
            .field("res", json!({"statusCode": 200}))
            .maybe_field("skipped", None);
        let line = record.to_line_value(1234);
        let keys: Vec<&String> = line.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["level", "time", "req", "res", "msg"]);
        assert_eq!(line["level"], json!(30));
        assert_eq!(line["time"], json!(1234));
        assert_eq!(line["msg"], json!("request-completed"));
    }
}
