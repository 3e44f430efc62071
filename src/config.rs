//! Settings for the Graph client and its credentials
//!
//! Settings are read from a JSON file shaped like
//!
//! ```json
//! {
//!   "azuread": { "tenant_id": "...", "client_id": "...", "client_secret": "..." },
//!   "graph":   { "base_url": "https://graph.microsoft.com/v1.0", "max_retries": 5 }
//! }
//! ```
//!
//! and may be overridden from the environment (`GRAPH_BASE_URL`,
//! `GRAPH_TIMEOUT`, `GRAPH_MAX_RETRIES`, `GRAPH_BACKOFF_FACTOR`).

use crate::error::{Error, Result};
use crate::http::GraphClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default Graph endpoint
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default per-call timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff base in seconds
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.5;

/// Default upper bound of the random jitter in seconds
pub const DEFAULT_MAX_JITTER: f64 = 0.25;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// App registration used for the client-credentials flow
    #[serde(default)]
    pub azuread: Option<AzureAdSettings>,

    /// HTTP client behaviour
    #[serde(default)]
    pub graph: GraphSettings,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse settings from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        Ok(settings)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// Apply `GRAPH_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (`key -> value`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(base_url) = get("GRAPH_BASE_URL") {
            self.graph.base_url = base_url;
        }
        if let Some(timeout) = get("GRAPH_TIMEOUT") {
            self.graph.timeout_secs = parse_value("GRAPH_TIMEOUT", &timeout)?;
        }
        if let Some(retries) = get("GRAPH_MAX_RETRIES") {
            self.graph.max_retries = parse_value("GRAPH_MAX_RETRIES", &retries)?;
        }
        if let Some(factor) = get("GRAPH_BACKOFF_FACTOR") {
            self.graph.backoff_factor = parse_value("GRAPH_BACKOFF_FACTOR", &factor)?;
        }
        Ok(())
    }
}

fn parse_value<T>(field: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| Error::invalid_value(field, format!("'{raw}': {e}")))
}

// ============================================================================
// Azure AD
// ============================================================================

/// Client-credentials app registration
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureAdSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Authority host, e.g. `https://login.microsoftonline.us`
    #[serde(default)]
    pub authority_base: Option<String>,
}

impl std::fmt::Debug for AzureAdSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAdSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("authority_base", &self.authority_base)
            .finish()
    }
}

// ============================================================================
// Graph HTTP Settings
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Base URL for relative request targets
    pub base_url: String,

    /// Per-call timeout in seconds
    #[serde(alias = "timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff base in seconds
    pub backoff_factor: f64,

    /// Upper bound of the random jitter added to computed backoff, in seconds
    pub max_jitter: f64,

    /// User-Agent header; the crate default when unset
    pub user_agent: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_jitter: DEFAULT_MAX_JITTER,
            user_agent: None,
        }
    }
}

impl GraphSettings {
    /// Validate and convert into the client configuration
    pub fn to_client_config(&self) -> Result<GraphClientConfig> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("graph.base_url", e.to_string()))?;

        if self.timeout_secs == 0 {
            return Err(Error::invalid_value(
                "graph.timeout_secs",
                "must be greater than zero",
            ));
        }
        let backoff = seconds("graph.backoff_factor", self.backoff_factor)?;
        let jitter = seconds("graph.max_jitter", self.max_jitter)?;

        let mut builder = GraphClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .backoff_factor(backoff)
            .max_jitter(jitter);

        if let Some(agent) = self.user_agent.as_deref().filter(|a| !a.trim().is_empty()) {
            builder = builder.user_agent(agent);
        }

        Ok(builder.build())
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_value(
            field,
            format!("{value} is not a non-negative number of seconds"),
        ));
    }
    Duration::try_from_secs_f64(value).map_err(|e| Error::invalid_value(field, e.to_string()))
}
