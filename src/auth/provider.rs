//! Token sources
//!
//! Handles fetching and caching bearer tokens for Graph requests.

use super::types::{
    normalize_scopes, CachedToken, TokenErrorResponse, TokenResponse, DEFAULT_AUTHORITY,
};
use crate::config::AzureAdSettings;
use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Something that can hand out a bearer token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a bearer token for `scopes` (`None` = the source's default)
    async fn access_token(&self, scopes: Option<&[String]>) -> Result<String>;
}

/// A token obtained elsewhere
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self, _scopes: Option<&[String]>) -> Result<String> {
        if self.token.is_empty() {
            return Err(Error::auth("static token is empty"));
        }
        Ok(self.token.clone())
    }
}

/// OAuth2 client-credentials flow against Entra ID (application permissions)
///
/// Tokens are cached per scope set until shortly before they expire.
pub struct ClientCredentials {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority_base: String,
    /// Cached tokens keyed by the space-joined scope list
    cache: Arc<RwLock<HashMap<String, CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
}

impl ClientCredentials {
    /// Create a provider for the given app registration
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into().trim().to_string(),
            client_id: client_id.into().trim().to_string(),
            client_secret: client_secret.into().trim().to_string(),
            authority_base: DEFAULT_AUTHORITY.to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            http_client: Client::new(),
        }
    }

    /// Override the authority host (sovereign clouds, tests)
    #[must_use]
    pub fn with_authority(mut self, authority_base: impl Into<String>) -> Self {
        self.authority_base = authority_base.into();
        self
    }

    /// Use a custom HTTP client for token requests
    #[must_use]
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Read `<prefix>TENANT_ID`, `<prefix>CLIENT_ID` and `<prefix>CLIENT_SECRET`
    pub fn from_env(prefix: &str) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            let key = format!("{prefix}{name}");
            std::env::var(&key)
                .ok()
                .map(|v| v.trim().to_string())
                .none_if_empty()
                .ok_or_else(|| Error::missing_field(key))
        };

        Ok(Self::new(
            read("TENANT_ID")?,
            read("CLIENT_ID")?,
            read("CLIENT_SECRET")?,
        ))
    }

    /// Build from the `azuread` settings section
    pub fn from_settings(settings: &AzureAdSettings) -> Result<Self> {
        for (field, value) in [
            ("azuread.tenant_id", &settings.tenant_id),
            ("azuread.client_id", &settings.client_id),
            ("azuread.client_secret", &settings.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        let mut provider = Self::new(
            &settings.tenant_id,
            &settings.client_id,
            &settings.client_secret,
        );
        if let Some(authority) = settings.authority_base.clone().none_if_empty() {
            provider = provider.with_authority(authority);
        }
        Ok(provider)
    }

    /// Authority URL including the tenant
    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_base.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Token endpoint of the v2.0 authority
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    /// Get a valid token, fetching a new one when the cache has none
    /// or `force_refresh` is set
    pub async fn token(&self, scopes: Option<&[String]>, force_refresh: bool) -> Result<String> {
        let scopes = normalize_scopes(scopes);
        let key = scopes.join(" ");

        if !force_refresh {
            let cached = self.cache.read().await;
            if let Some(token) = cached.get(&key) {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        // Need to refresh - acquire write lock
        let mut cached = self.cache.write().await;

        // Double-check after acquiring write lock (another task might have refreshed)
        if !force_refresh {
            if let Some(token) = cached.get(&key) {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_token(&key).await?;
        let token_str = new_token.token.clone();
        cached.insert(key, new_token);

        Ok(token_str)
    }

    /// Fetch a token from the token endpoint
    async fn fetch_token(&self, scope: &str) -> Result<CachedToken> {
        debug!(
            "Requesting client-credentials token for scope '{}' from {}",
            scope,
            self.authority()
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http_client
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|err| err.summary())
                .unwrap_or_else(|_| "no error details".to_string());
            return Err(Error::OAuth2 {
                message: format!("Token acquisition failed with status {status}: {details}"),
            });
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        Ok(token_response.into_cached_token())
    }

    /// Clear all cached tokens
    pub async fn clear_cache(&self) {
        let mut cached = self.cache.write().await;
        cached.clear();
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn access_token(&self, scopes: Option<&[String]>) -> Result<String> {
        self.token(scopes, false).await
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let client_id: String = self.client_id.chars().take(6).collect();
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &format!("{client_id}…"))
            .field("authority_base", &self.authority_base)
            .finish_non_exhaustive()
    }
}
