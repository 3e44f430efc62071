//! In-memory log buffer

use super::sink::{mask_secrets, LogSink, TracingSink, DEFAULT_MASK_KEYS};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue, LogLevel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// One buffered log event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Context with sensitive values already masked
    #[serde(flatten)]
    pub context: JsonObject,
}

/// Sink that keeps every event in memory
///
/// With `echo` enabled each event is also forwarded to [`TracingSink`].
#[derive(Debug)]
pub struct LogBuffer {
    echo: bool,
    mask_keys: Vec<String>,
    entries: Mutex<Vec<LogEntry>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    /// Buffer with echo enabled and the default mask keys
    pub fn new() -> Self {
        Self {
            echo: true,
            mask_keys: DEFAULT_MASK_KEYS.iter().map(ToString::to_string).collect(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Buffer that does not forward to tracing
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn with_mask_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn debug(&self, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        self.log(LogLevel::Debug, message, context)
    }

    pub fn info(&self, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        self.log(LogLevel::Info, message, context)
    }

    pub fn warning(&self, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        self.log(LogLevel::Warning, message, context)
    }

    pub fn error(&self, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        self.log(LogLevel::Error, message, context)
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Number of entries carrying exactly this message
    pub fn count_message(&self, message: &str) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|e| e.message == message).count())
            .unwrap_or(0)
    }

    /// Entries rendered as JSON objects (`ts`, `level`, `message`, context...)
    pub fn to_json(&self) -> Result<Vec<JsonValue>> {
        self.entries()
            .iter()
            .map(|entry| serde_json::to_value(entry).map_err(Error::from))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl LogSink for LogBuffer {
    fn log(&self, level: LogLevel, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        let masked = mask_secrets(context, self.mask_keys.as_slice());
        let entry = LogEntry {
            ts: Utc::now(),
            level,
            message: message.to_string(),
            context: masked,
        };

        if self.echo {
            let shown: Vec<(&str, JsonValue)> = entry
                .context
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            TracingSink.log(level, message, &shown)?;
        }

        self.entries
            .lock()
            .map_err(|_| Error::Other("log buffer lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
