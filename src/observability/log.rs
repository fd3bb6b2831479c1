//! Leveled structured logger with contextual children.
//!
//! # Responsibilities
//! - Accept `(level, fields, message)` records from any subsystem
//! - Merge parent context into every record emitted by a child logger
//! - Hand finished records to a [`LogSink`]
//!
//! # Design Decisions
//! - Context is stored as an `Arc` so cloning a logger is cheap
//! - Call-site fields override child fields, which override parent fields
//! - Non-object call-site payloads are kept under a `data` key

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::sink::{LogSink, NullSink};

/// Open set of structured fields attached to a record.
pub type Fields = Map<String, Value>;

/// Record severity, with bunyan-compatible numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Numeric severity written to the `level` field of a record.
    pub fn severity(self) -> u8 {
        match self {
            Level::Trace => 10,
            Level::Debug => 20,
            Level::Info => 30,
            Level::Warn => 40,
            Level::Error => 50,
            Level::Fatal => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// A single log event after context merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub msg: String,
    pub fields: Fields,
}

impl Record {
    /// Look up a merged field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Structured logger handle.
///
/// A `Log` is either backed by a real sink or by [`NullSink`], in which case
/// every call is a no-op. Call sites never need to know which.
#[derive(Clone)]
pub struct Log {
    sink: Arc<dyn LogSink>,
    context: Arc<Fields>,
}

impl Log {
    /// Create a logger writing to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            context: Arc::new(Fields::new()),
        }
    }

    /// A logger that discards everything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Derive a logger whose records always include `fields`.
    pub fn child(&self, fields: Value) -> Self {
        if !self.sink.enabled() {
            return self.clone();
        }
        let mut context = (*self.context).clone();
        merge_into(&mut context, fields);
        Self {
            sink: Arc::clone(&self.sink),
            context: Arc::new(context),
        }
    }

    /// Emit a record.
    pub fn log(&self, level: Level, fields: Value, msg: impl Into<String>) {
        if !self.sink.enabled() {
            return;
        }
        let mut merged = (*self.context).clone();
        merge_into(&mut merged, fields);
        let record = Record {
            level,
            msg: msg.into(),
            fields: merged,
        };
        self.sink.write(&record);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(Level::Info, Value::Null, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.log(Level::Warn, Value::Null, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(Level::Error, Value::Null, msg);
    }

    pub fn fatal(&self, msg: impl Into<String>) {
        self.log(Level::Fatal, Value::Null, msg);
    }

    /// Fields every record from this logger carries.
    pub fn context(&self) -> &Fields {
        &self.context
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("enabled", &self.sink.enabled())
            .field("context", &self.context)
            .finish()
    }
}

fn merge_into(target: &mut Fields, fields: Value) {
    match fields {
        Value::Null => {}
        Value::Object(map) => target.extend(map),
        other => {
            target.insert("data".to_string(), other);
        }
    }
}
