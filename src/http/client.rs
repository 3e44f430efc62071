//! Graph HTTP client with retry, backoff and paging
//!
//! Provides a resilient client that handles:
//! - Bearer token injection from a [`TokenSource`] on every attempt
//! - Automatic retries of 429/5xx and transport failures
//! - `Retry-After` aware exponential backoff with jitter
//! - OData parameter normalization and `ConsistencyLevel` negotiation
//! - Lazy cursor paging over `@odata.nextLink`

use super::retry::{body_preview, parse_retry_after, RetryPolicy, BODY_PREVIEW_LIMIT};
use crate::auth::TokenSource;
use crate::error::{is_retryable_status, Error, Result};
use crate::logging::{LogSink, TracingSink};
use crate::odata::{needs_consistency_level, QueryParams};
use crate::types::{JsonValue, LogLevel};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Accept header sent with every request
pub const JSON_ACCEPT: &str = "application/json;odata.metadata=none";

/// Header carrying the consistency level for advanced queries
pub const CONSISTENCY_LEVEL_HEADER: &str = "ConsistencyLevel";

/// Page field holding the absolute URL of the next page
pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";

const EVENTUAL: &str = "eventual";

/// Configuration for the Graph client
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    /// Base URL relative targets are joined to
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay of the exponential backoff
    pub backoff_factor: Duration,
    /// Upper bound of the random jitter added to computed delays
    pub max_jitter: Duration,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for GraphClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 5,
            backoff_factor: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
            default_headers: HashMap::new(),
            user_agent: format!(
                "graphfw/{} (+https://graph.microsoft.com)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl GraphClientConfig {
    /// Create a new config builder
    pub fn builder() -> GraphClientConfigBuilder {
        GraphClientConfigBuilder::default()
    }

    /// Retry policy derived from this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_factor, self.max_jitter)
    }
}

/// Builder for the Graph client config
#[derive(Default)]
pub struct GraphClientConfigBuilder {
    config: GraphClientConfig,
}

impl GraphClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the base backoff delay
    pub fn backoff_factor(mut self, factor: Duration) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    /// Set the jitter bound
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.config.max_jitter = jitter;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> GraphClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Query parameters; keys are normalized before sending
    pub params: QueryParams,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Statuses treated as success
    pub expected_statuses: BTreeSet<u16>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Explicit `ConsistencyLevel`; wins over auto-detection
    pub consistency_level: Option<String>,
    /// Override max retries for this request
    pub max_retries: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: QueryParams::new(),
            headers: HashMap::new(),
            body: None,
            expected_statuses: BTreeSet::from([200]),
            timeout: None,
            consistency_level: None,
            max_retries: None,
        }
    }
}

impl RequestOptions {
    /// Create request options expecting `200`
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn params(mut self, params: impl Into<QueryParams>) -> Self {
        self.params = params.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace the set of success statuses
    #[must_use]
    pub fn expect(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expected_statuses = statuses.into_iter().collect();
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Force a `ConsistencyLevel` header value
    #[must_use]
    pub fn consistency_level(mut self, level: impl Into<String>) -> Self {
        self.consistency_level = Some(level.into());
        self
    }

    /// Set max retries
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// Configuration for a paged read
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Query parameters of the first request only
    pub params: QueryParams,
    /// Page field holding the items; `None` yields whole pages
    pub item_path: Option<String>,
    /// Sent as `$top` on the first request unless a top is already given
    pub page_size_hint: Option<u32>,
    /// Override timeout for every page
    pub timeout: Option<Duration>,
    /// Explicit `ConsistencyLevel` for every page
    pub consistency_level: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            params: QueryParams::new(),
            item_path: Some("value".to_string()),
            page_size_hint: None,
            timeout: None,
            consistency_level: None,
        }
    }
}

impl PageOptions {
    /// Page through `value` arrays
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn params(mut self, params: impl Into<QueryParams>) -> Self {
        self.params = params.into();
        self
    }

    /// Read items from another page field
    #[must_use]
    pub fn item_path(mut self, path: impl Into<String>) -> Self {
        self.item_path = Some(path.into());
        self
    }

    /// Yield each page object instead of its items
    #[must_use]
    pub fn whole_pages(mut self) -> Self {
        self.item_path = None;
        self
    }

    /// Ask the server for pages of this size
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size_hint = Some(size);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Force a `ConsistencyLevel` header value
    #[must_use]
    pub fn consistency_level(mut self, level: impl Into<String>) -> Self {
        self.consistency_level = Some(level.into());
        self
    }
}

/// Cursor state of one paged read
struct PageCursor {
    next: Option<(String, QueryParams)>,
    buffered: VecDeque<JsonValue>,
    item_path: Option<String>,
    timeout: Option<Duration>,
    consistency_level: Option<String>,
}

/// Microsoft Graph client
pub struct GraphClient {
    client: Client,
    config: GraphClientConfig,
    token_source: Arc<dyn TokenSource>,
    log_sink: Arc<dyn LogSink>,
}

impl GraphClient {
    /// Create a client; events go to tracing until a sink is attached
    pub fn new(config: GraphClientConfig, token_source: Arc<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            config,
            token_source,
            log_sink: Arc::new(TracingSink),
        })
    }

    /// Send request events to `sink` instead of tracing
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Get the client configuration
    pub fn config(&self) -> &GraphClientConfig {
        &self.config
    }

    /// Make a GET request expecting `200`
    pub async fn get(&self, target: &str) -> Result<Response> {
        self.request(Method::GET, target, RequestOptions::default())
            .await
    }

    /// Make a request, retrying transient failures
    ///
    /// A response whose status is in `expected_statuses` is returned as is.
    /// 429 and 5xx responses outside that set, as well as transport errors,
    /// are retried up to the retry budget. Any other status is an
    /// [`Error::HttpStatus`] carrying a preview of the body.
    pub async fn request(
        &self,
        method: Method,
        target: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        if options.expected_statuses.is_empty() {
            return Err(Error::invalid_request(
                "expected_statuses must contain at least one status",
            ));
        }

        let url = self.build_url(target);
        let params = options.params.normalized();
        let consistency_level = options
            .consistency_level
            .clone()
            .or_else(|| needs_consistency_level(&params).then(|| EVENTUAL.to_string()));
        let policy = match options.max_retries {
            Some(retries) => RetryPolicy {
                max_retries: retries,
                ..self.config.retry_policy()
            },
            None => self.config.retry_policy(),
        };
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let token = self.token_source.access_token(None).await?;
            let headers =
                self.build_headers(&token, &options.headers, consistency_level.as_deref())?;

            let mut req = self
                .client
                .request(method.clone(), &url)
                .headers(headers)
                .timeout(timeout);
            if !params.is_empty() {
                req = req.query(&params);
            }
            if let Some(ref body) = options.body {
                req = req.json(body);
            }

            self.emit(
                LogLevel::Debug,
                "HTTP request",
                &[
                    ("method", json!(method.as_str())),
                    ("url", json!(url)),
                    ("attempt", json!(attempt)),
                ],
            );

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) => {
                    if policy.should_retry(attempt) {
                        let delay = policy.delay(attempt, None);
                        self.emit(
                            LogLevel::Warning,
                            "HTTP retry",
                            &[
                                ("url", json!(url)),
                                ("method", json!(method.as_str())),
                                ("status", JsonValue::Null),
                                ("attempt", json!(attempt)),
                                ("retry_after", JsonValue::Null),
                                ("error", json!(e.to_string())),
                            ],
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    self.emit(
                        LogLevel::Error,
                        "HTTP request failed (no response)",
                        &[
                            ("url", json!(url)),
                            ("method", json!(method.as_str())),
                            ("attempt", json!(attempt)),
                            ("error", json!(e.to_string())),
                        ],
                    );
                    return Err(Error::Http(e));
                }
            };

            let status = response.status().as_u16();
            if options.expected_statuses.contains(&status) {
                return Ok(response);
            }

            if is_retryable_status(status) && policy.should_retry(attempt) {
                let retry_after = parse_retry_after(response.headers());
                let delay = policy.delay(attempt, retry_after);
                self.emit(
                    LogLevel::Warning,
                    "HTTP retry",
                    &[
                        ("url", json!(url)),
                        ("method", json!(method.as_str())),
                        ("status", json!(status)),
                        ("attempt", json!(attempt)),
                        (
                            "retry_after",
                            retry_after.map_or(JsonValue::Null, |d| json!(d.as_secs_f64())),
                        ),
                    ],
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let preview = body_preview(&body, BODY_PREVIEW_LIMIT);
            self.emit(
                LogLevel::Error,
                "HTTP error",
                &[
                    ("url", json!(url)),
                    ("method", json!(method.as_str())),
                    ("status", json!(status)),
                    ("body", json!(preview)),
                ],
            );
            return Err(Error::http_status(status, url, preview));
        }
    }

    /// Make a request and parse the JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        target: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.request(method, target, options).await?;
        let json: T = response.json().await.map_err(Error::Http)?;
        Ok(json)
    }

    /// GET a resource expecting `200` and parse the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        target: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.request_json(Method::GET, target, options).await
    }

    /// Stream items of a paged collection
    ///
    /// Pages are fetched lazily, one request per page, following
    /// `@odata.nextLink` verbatim. The stream ends after yielding an error.
    pub fn get_paged<'a>(
        &'a self,
        target: &str,
        options: PageOptions,
    ) -> BoxStream<'a, Result<JsonValue>> {
        let PageOptions {
            mut params,
            item_path,
            page_size_hint,
            timeout,
            consistency_level,
        } = options;

        if let Some(size) = page_size_hint.filter(|&size| size > 0) {
            if !params.contains_key("$top") && !params.contains_key("top") {
                params.insert("$top", size);
            }
        }

        // Only an explicit level follows the cursor; the automatic one comes
        // from each request's own params, and cursor pages carry none.
        let cursor = PageCursor {
            next: Some((self.build_url(target), params)),
            buffered: VecDeque::new(),
            item_path,
            timeout,
            consistency_level,
        };

        stream::try_unfold(cursor, move |cursor| self.next_paged_item(cursor)).boxed()
    }

    async fn next_paged_item(
        &self,
        mut cursor: PageCursor,
    ) -> Result<Option<(JsonValue, PageCursor)>> {
        loop {
            if let Some(item) = cursor.buffered.pop_front() {
                return Ok(Some((item, cursor)));
            }
            let Some((url, params)) = cursor.next.take() else {
                return Ok(None);
            };

            let mut options = RequestOptions::new().params(params);
            if let Some(timeout) = cursor.timeout {
                options = options.timeout(timeout);
            }
            if let Some(ref level) = cursor.consistency_level {
                options = options.consistency_level(level.clone());
            }

            let mut page: JsonValue = self.get_json(&url, options).await?;
            cursor.next = next_link(&page).map(|link| (link, QueryParams::new()));

            match cursor.item_path.as_deref() {
                Some(path) => cursor.buffered.extend(take_items(&mut page, path)?),
                None => cursor.buffered.push_back(page),
            }
        }
    }

    /// Build full URL from a relative path or absolute URL
    pub fn build_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }

        let base = self.config.base_url.trim_end_matches('/');
        let path = target.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn build_headers(
        &self,
        token: &str,
        extra: &HashMap<String, String>,
        consistency_level: Option<&str>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut bearer = header_value(&format!("Bearer {token}"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));

        for (key, value) in self.config.default_headers.iter().chain(extra) {
            headers.insert(header_name(key)?, header_value(value)?);
        }

        if let Some(level) = consistency_level {
            headers.insert(header_name(CONSISTENCY_LEVEL_HEADER)?, header_value(level)?);
        }

        Ok(headers)
    }

    /// Log sink failures never affect the request
    fn emit(&self, level: LogLevel, message: &str, context: &[(&str, JsonValue)]) {
        let _ = self.log_sink.log(level, message, context);
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::invalid_request(format!("invalid header name '{name}': {e}")))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_request(format!("invalid header value: {e}")))
}

/// Non-empty `@odata.nextLink` of a page
fn next_link(page: &JsonValue) -> Option<String> {
    page.get(NEXT_LINK_FIELD)
        .and_then(JsonValue::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
}

/// Remove the item array at `path`; absent or null means an empty page
fn take_items(page: &mut JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    match page.get_mut(path).map(JsonValue::take) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => Ok(items),
        Some(other) => Err(Error::extraction(
            path,
            format!("expected an array of items, found {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
