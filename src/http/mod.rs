//! HTTP client module
//!
//! Provides the Graph HTTP client with retry, backoff and cursor paging.
//!
//! # Features
//!
//! - **Automatic Retries**: 429/5xx and transport failures, bounded by a retry budget
//! - **Backoff**: `Retry-After` when the server sends one, otherwise exponential with jitter
//! - **Paging**: lazy item stream following `@odata.nextLink`
//! - **Consistency**: `ConsistencyLevel: eventual` for `$count`/`$search` queries

mod client;
mod retry;

pub use client::{
    GraphClient, GraphClientConfig, GraphClientConfigBuilder, PageOptions, RequestOptions,
    CONSISTENCY_LEVEL_HEADER, JSON_ACCEPT, NEXT_LINK_FIELD,
};
pub use retry::{body_preview, parse_retry_after, RetryPolicy, BODY_PREVIEW_LIMIT};
