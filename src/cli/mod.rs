//! CLI module
//!
//! Command-line interface for ad-hoc Graph calls.
//!
//! # Commands
//!
//! - `get` - Fetch one resource as JSON
//! - `request` - Send an arbitrary method with an optional JSON body
//! - `pages` - Stream every item of a paged collection
//! - `token` - Acquire an access token

mod commands;
mod runner;

pub use commands::{parse_param, Cli, Commands, OutputFormat};
pub use runner::Runner;
