// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # graphfw
//!
//! A resilient client for Microsoft Graph.
//!
//! ## Features
//!
//! - **Bearer Auth**: pluggable `TokenSource`, client-credentials flow with token cache
//! - **Retries**: 429/5xx and transport failures with `Retry-After` aware backoff
//! - **OData**: bare option names (`select`, `top`) normalized to `$select`, `$top`
//! - **Consistency**: `ConsistencyLevel: eventual` added for `$count`/`$search`
//! - **Paging**: lazy item stream following `@odata.nextLink`
//! - **Structured Logs**: injectable `LogSink` with secret masking
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::TryStreamExt;
//! use graphfw::auth::ClientCredentials;
//! use graphfw::http::{GraphClient, GraphClientConfig, PageOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> graphfw::Result<()> {
//!     let credentials = ClientCredentials::from_env("AZURE_")?;
//!     let client = GraphClient::new(GraphClientConfig::default(), Arc::new(credentials))?;
//!
//!     let users: Vec<serde_json::Value> = client
//!         .get_paged("/users", PageOptions::new().param("select", "id,displayName").page_size(999))
//!         .try_collect()
//!         .await?;
//!
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        GraphClient                           │
//! │  request() → Response   get_json() → T   get_paged() → Stream│
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────────┴─┬──────────────┬──────────────┐
//! │    Auth    │       HTTP        │    OData     │   Logging    │
//! ├────────────┼───────────────────┼──────────────┼──────────────┤
//! │ Static     │ Retry             │ $-prefixing  │ Tracing      │
//! │ Client     │ Retry-After       │ Consistency  │ Buffer       │
//! │ credentials│ Backoff + jitter  │ Builder      │ Masking      │
//! └────────────┴───────────────────┴──────────────┴──────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for graphfw
pub mod error;

/// Common types and type aliases
pub mod types;

/// Token sources
pub mod auth;

/// Graph HTTP client with retry and paging
pub mod http;

/// OData query parameters
pub mod odata;

/// Structured log sinks
pub mod logging;

/// Settings file and environment overrides
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{ClientCredentials, StaticToken, TokenSource};
pub use http::{GraphClient, GraphClientConfig, PageOptions, RequestOptions};
pub use logging::{LogBuffer, LogSink, TracingSink};
pub use odata::{OData, QueryParams};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
