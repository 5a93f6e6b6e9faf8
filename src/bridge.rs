use crate::adapter::LogAdapter;
use crate::events::Event;
use crate::sanitize::RawValue;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event as TracingEvent, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// `tracing_subscriber` layer that forwards host `tracing` events into
/// the adapter as server app-log events.
///
/// The event target and level name become tags, so the level name
/// resolves back to the matching severity through the tag map, and the
/// recorded fields travel as the event data.
pub struct TracingBridge {
    adapter: Arc<LogAdapter>,
}

impl TracingBridge {
    pub fn new(adapter: Arc<LogAdapter>) -> TracingBridge {
        TracingBridge { adapter }
    }
}

impl<S> Layer<S> for TracingBridge
where
    S: Subscriber,
{
    fn on_event(&self, event: &TracingEvent, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level_tag = match *meta.level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };

        let mut fields = serde_json::Map::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let mut pairs: Vec<(String, RawValue)> = Vec::new();
        if let Some(message) = message {
            pairs.push(("message".to_string(), RawValue::Str(message)));
        }
        for (key, value) in fields {
            pairs.push((key, RawValue::from(value)));
        }
        let data = if pairs.is_empty() {
            None
        } else {
            Some(RawValue::object(pairs))
        };

        self.adapter.handle(Event::ServerLog {
            tags: vec![meta.target().to_string(), level_tag.to_string()],
            data,
            error: None,
        });
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut serde_json::Map<String, serde_json::Value>,
    message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }
}
