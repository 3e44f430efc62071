//! Auth support types
//!
//! Token cache entries, the token endpoint response and scope handling.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Scope requested when the caller passes none
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Entra ID authority host
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    ///
    /// Lifetimes beyond what `DateTime` can represent clamp to its range.
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = TimeDelta::try_seconds(seconds)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(if seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}

/// Successful token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub(crate) fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token, secs),
            None => CachedToken::new(self.access_token, None),
        }
    }
}

/// Failed token endpoint response; only these fields are ever surfaced
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl TokenErrorResponse {
    pub(crate) fn summary(&self) -> String {
        format!(
            "error={}; error_description={}; correlation_id={}",
            self.error.as_deref().unwrap_or("-"),
            self.error_description.as_deref().unwrap_or("-"),
            self.correlation_id.as_deref().unwrap_or("-"),
        )
    }
}

/// Trim scopes and drop blanks; nothing left means the Graph default scope
pub fn normalize_scopes(scopes: Option<&[String]>) -> Vec<String> {
    let scopes: Vec<String> = scopes
        .unwrap_or_default()
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if scopes.is_empty() {
        vec![GRAPH_DEFAULT_SCOPE.to_string()]
    } else {
        scopes
    }
}
