//! Log sink trait and the tracing-backed sink

use crate::error::Result;
use crate::types::{JsonObject, JsonValue, LogLevel};
use tracing::{debug, error, info, warn};

/// Context keys whose values are replaced by `***` (substring match, case-insensitive)
pub const DEFAULT_MASK_KEYS: [&str; 4] = ["client_secret", "password", "secret", "token"];

/// Receiver of structured log events
///
/// Callers must treat an `Err` as non-fatal: logging never replaces or
/// masks the outcome of the operation being logged.
pub trait LogSink: Send + Sync {
    /// Record one event with its key/value context
    fn log(&self, level: LogLevel, message: &str, context: &[(&str, JsonValue)]) -> Result<()>;
}

/// Sink that emits `tracing` events under the `graphfw` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, context: &[(&str, JsonValue)]) -> Result<()> {
        let fields = render_context(context);
        match level {
            LogLevel::Debug => debug!(target: "graphfw", "{message}{fields}"),
            LogLevel::Info => info!(target: "graphfw", "{message}{fields}"),
            LogLevel::Warning => warn!(target: "graphfw", "{message}{fields}"),
            LogLevel::Error => error!(target: "graphfw", "{message}{fields}"),
        }
        Ok(())
    }
}

/// Render context as ` | key=value key=value` (empty string for no context)
pub(crate) fn render_context(context: &[(&str, JsonValue)]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let pairs = context
        .iter()
        .map(|(key, value)| match value {
            JsonValue::String(s) => format!("{key}={s}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!(" | {pairs}")
}

/// Copy `context` into an object, masking values of sensitive keys
pub fn mask_secrets<S: AsRef<str>>(context: &[(&str, JsonValue)], mask_keys: &[S]) -> JsonObject {
    context
        .iter()
        .map(|(key, value)| {
            let lower = key.to_lowercase();
            let masked = mask_keys
                .iter()
                .any(|m| lower.contains(&m.as_ref().to_lowercase()));
            let value = if masked {
                JsonValue::String("***".to_string())
            } else {
                value.clone()
            };
            ((*key).to_string(), value)
        })
        .collect()
}
