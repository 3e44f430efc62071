//! Structured logging module
//!
//! Components that want to report diagnostics receive a `LogSink` explicitly;
//! there is no global logger object.
//!
//! - `TracingSink` forwards to `tracing` events
//! - `LogBuffer` keeps masked entries in memory for later inspection/export

mod buffer;
mod sink;

pub use buffer::{LogBuffer, LogEntry};
pub use sink::{mask_secrets, LogSink, TracingSink, DEFAULT_MASK_KEYS};
