//! Authentication module
//!
//! Supplies bearer tokens to the Graph client.
//!
//! The client asks its `TokenSource` for a token on every attempt; caching
//! and refresh are the token source's business. `ClientCredentials`
//! implements the Entra ID client-credentials flow with an in-memory cache.

mod provider;
mod types;

pub use provider::{ClientCredentials, StaticToken, TokenSource};
pub use types::{normalize_scopes, CachedToken, DEFAULT_AUTHORITY, GRAPH_DEFAULT_SCOPE};
