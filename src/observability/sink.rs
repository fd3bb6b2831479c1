//! Record sinks.
//!
//! # Responsibilities
//! - Turn merged [`Record`]s into output (stdout lines, tracing events, memory)
//! - Add process-wide fields (`name`, `pid`, `time`)
//! - Swallow every write failure
//!
//! # Design Decisions
//! - Sinks are append-only and internally synchronized
//! - Reserved keys (`level`, `msg`, ...) cannot be overwritten by record fields
//! - A poisoned lock is recovered rather than propagated

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::log::{Level, Record};

/// Destination for finished log records.
pub trait LogSink: Send + Sync {
    /// Write one record. Must not panic.
    fn write(&self, record: &Record);

    /// Whether records are consumed at all.
    fn enabled(&self) -> bool {
        true
    }
}

/// Sink used when no logger is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _record: &Record) {}

    fn enabled(&self) -> bool {
        false
    }
}

const RESERVED_KEYS: [&str; 6] = ["v", "level", "name", "pid", "time", "msg"];

/// Writes one JSON object per line.
pub struct JsonLineSink {
    name: String,
    min_level: Level,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineSink {
    /// Sink writing to an arbitrary writer.
    pub fn new(name: impl Into<String>, min_level: Level, writer: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            min_level,
            writer: Mutex::new(writer),
        }
    }

    /// Sink writing to standard output.
    pub fn stdout(name: impl Into<String>, min_level: Level) -> Self {
        Self::new(name, min_level, Box::new(io::stdout()))
    }

    fn render(&self, record: &Record) -> Value {
        let mut line = Map::new();
        line.insert("v".into(), Value::from(0));
        line.insert("level".into(), Value::from(record.level.severity()));
        line.insert("name".into(), Value::from(self.name.as_str()));
        line.insert("pid".into(), Value::from(std::process::id()));
        line.insert(
            "time".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        line.insert("msg".into(), Value::from(record.msg.as_str()));
        for (key, value) in &record.fields {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            line.insert(key.clone(), value.clone());
        }
        Value::Object(line)
    }
}

impl LogSink for JsonLineSink {
    fn write(&self, record: &Record) {
        if record.level < self.min_level {
            return;
        }
        let mut line = match serde_json::to_vec(&self.render(record)) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        line.push(b'\n');
        let mut writer = lock(&self.writer);
        let _ = writer.write_all(&line);
        let _ = writer.flush();
    }
}

/// Re-emits records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &Record) {
        let fields = Value::Object(record.fields.clone());
        let severity = record.level.severity();
        let msg = record.msg.as_str();
        match record.level {
            Level::Trace => tracing::trace!(severity, fields = %fields, "{msg}"),
            Level::Debug => tracing::debug!(severity, fields = %fields, "{msg}"),
            Level::Info => tracing::info!(severity, fields = %fields, "{msg}"),
            Level::Warn => tracing::warn!(severity, fields = %fields, "{msg}"),
            Level::Error | Level::Fatal => tracing::error!(severity, fields = %fields, "{msg}"),
        }
    }
}

/// Bounded in-memory ring of records, oldest evicted first.
#[derive(Debug)]
pub struct MemorySink {
    capacity: usize,
    records: Mutex<VecDeque<Record>>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Snapshot of the buffered records, oldest first.
    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).iter().cloned().collect()
    }

    /// Remove and return the newest record.
    pub fn pop(&self) -> Option<Record> {
        lock(&self.records).pop_back()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &Record) {
        let mut records = lock(&self.records);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
