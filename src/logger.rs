use crate::record::LogRecord;
use crate::severity::Severity;
use crate::stream::LogStream;
use chrono::Utc;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Line terminator appended to every emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

type LevelListener = Box<dyn Fn(Option<Severity>, Severity) + Send + Sync>;

/// A leveled sink bound to one destination stream.
///
/// The threshold is runtime mutable; every change notifies registered
/// listeners with the old and new level so subscription state can be
/// recomputed. Records below the threshold are dropped before any
/// encoding work happens.
pub struct Logger {
    stream: Arc<dyn LogStream>,
    threshold: AtomicU8,
    ending: LineEnding,
    listeners: Mutex<Vec<LevelListener>>,
}

impl Logger {
    pub fn new(stream: Arc<dyn LogStream>, level: Severity, ending: LineEnding) -> Logger {
        Logger {
            stream,
            threshold: AtomicU8::new(level.value()),
            ending,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn level(&self) -> Severity {
        // Only values produced by `Severity::value` are ever stored.
        Severity::from_value(self.threshold.load(Ordering::Relaxed)).unwrap_or(Severity::Info)
    }

    /// Change the threshold; listeners fire only on an actual change.
    pub fn set_level(&self, level: Severity) {
        let old = self.threshold.swap(level.value(), Ordering::Relaxed);
        if old == level.value() {
            return;
        }
        let old = Severity::from_value(old);
        let listeners = self.listeners.lock().expect("listener list poisoned");
        for listener in listeners.iter() {
            listener(old, level);
        }
    }

    pub fn on_level_change(&self, listener: impl Fn(Option<Severity>, Severity) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .expect("listener list poisoned")
            .push(Box::new(listener));
    }

    /// Would a record at `level` currently be emitted?
    pub fn is_enabled(&self, level: Severity) -> bool {
        level != Severity::Silent && level.value() >= self.threshold.load(Ordering::Relaxed)
    }

    /// Encode and write one record as a single NDJSON line.
    pub fn write(&self, record: &LogRecord) -> io::Result<()> {
        if !self.is_enabled(record.level) {
            return Ok(());
        }
        let value = record.to_line_value(Utc::now().timestamp_millis());
        let mut line = serde_json::to_string(&value).map_err(io::Error::from)?;
        line.push_str(self.ending.as_str());
        self.stream.write_line(&line)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferStream;
    use serde_json::json;

    #[test]
    fn below_threshold_records_are_dropped() {
        let buffer = BufferStream::new();
        let logger = Logger::new(Arc::new(buffer.clone()), Severity::Warn, LineEnding::Lf);
        logger.write(&LogRecord::new(Severity::Info, "quiet")).unwrap();
        logger.write(&LogRecord::new(Severity::Error, "loud")).unwrap();
        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["msg"], json!("loud"));
        assert_eq!(records[0]["level"], json!(50));
    }

    #[test]
    fn silent_threshold_disables_everything() {
        let buffer = BufferStream::new();
        let logger = Logger::new(Arc::new(buffer.clone()), Severity::Silent, LineEnding::Lf);
        logger.write(&LogRecord::new(Severity::Fatal, "nope")).unwrap();
        assert!(buffer.lines().is_empty());
    }

    #[test]
    fn level_change_notifies_listeners_once() {
        let logger = Logger::new(Arc::new(BufferStream::new()), Severity::Info, LineEnding::Lf);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        logger.on_level_change(move |old, new| {
            seen_cb.lock().unwrap().push((old, new));
        });
        logger.set_level(Severity::Debug);
        logger.set_level(Severity::Debug); // no-op, no notification
        logger.set_level(Severity::Error);
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (Some(Severity::Info), Severity::Debug),
                (Some(Severity::Debug), Severity::Error),
            ]
        );
    }

    #[test]
    fn crlf_line_ending_is_applied() {
        let buffer = BufferStream::new();
        let logger = Logger::new(Arc::new(buffer.clone()), Severity::Trace, LineEnding::CrLf);
        logger.write(&LogRecord::new(Severity::Info, "m")).unwrap();
        let lines = buffer.lines();
        assert!(lines[0].ends_with("}\r\n"));
    }
}
