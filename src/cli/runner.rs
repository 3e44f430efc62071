//! CLI runner - executes commands

use crate::auth::{ClientCredentials, StaticToken, TokenSource};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use crate::http::{GraphClient, PageOptions, RequestOptions};
use crate::logging::TracingSink;
use crate::odata::QueryParams;
use crate::types::{JsonValue, Method};
use futures::StreamExt;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, printing to stdout
    pub async fn run(&self) -> Result<()> {
        let mut stdout = std::io::stdout();
        self.run_with_output(&mut stdout).await
    }

    /// Run the CLI command, writing documents to `out`
    pub async fn run_with_output<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = Settings::load(self.cli.config.as_deref())?;

        match &self.cli.command {
            Commands::Get {
                target,
                params,
                consistency_level,
            } => {
                let mut options = RequestOptions::new().params(to_params(params));
                if let Some(level) = consistency_level {
                    options = options.consistency_level(level);
                }
                let client = self.build_client(&settings)?;
                let body: JsonValue = client.get_json(target, options).await?;
                self.output_message(out, &body)
            }
            Commands::Request {
                method,
                target,
                params,
                body,
                expect,
            } => {
                self.request(out, &settings, *method, target, params, body.as_deref(), expect)
                    .await
            }
            Commands::Pages {
                target,
                params,
                item_path,
                whole_pages,
                page_size,
                max_items,
                consistency_level,
            } => {
                let mut options = PageOptions::new()
                    .params(to_params(params))
                    .item_path(item_path);
                if *whole_pages {
                    options = options.whole_pages();
                }
                if let Some(size) = page_size {
                    options = options.page_size(*size);
                }
                if let Some(level) = consistency_level {
                    options = options.consistency_level(level);
                }
                self.pages(out, &settings, target, options, *max_items)
                    .await
            }
            Commands::Token {
                scopes,
                force_refresh,
            } => self.token(out, &settings, scopes, *force_refresh).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn request<W: Write>(
        &self,
        out: &mut W,
        settings: &Settings,
        method: Method,
        target: &str,
        params: &[(String, String)],
        body: Option<&str>,
        expect: &[u16],
    ) -> Result<()> {
        let mut options = RequestOptions::new().params(to_params(params));
        if let Some(raw) = body {
            let body: JsonValue = serde_json::from_str(raw)
                .map_err(|e| Error::invalid_request(format!("Invalid body JSON: {e}")))?;
            options = options.json(body);
        }
        if !expect.is_empty() {
            options = options.expect(expect.iter().copied());
        }

        let client = self.build_client(settings)?;
        let response = client.request(method.into(), target, options).await?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        };
        self.output_message(out, &json!({ "status": status, "body": body }))
    }

    async fn pages<W: Write>(
        &self,
        out: &mut W,
        settings: &Settings,
        target: &str,
        options: PageOptions,
        max_items: Option<usize>,
    ) -> Result<()> {
        if max_items == Some(0) {
            return Ok(());
        }

        let client = self.build_client(settings)?;
        let mut stream = client.get_paged(target, options);
        let mut count = 0usize;

        while let Some(item) = stream.next().await {
            self.output_message(out, &item?)?;
            count += 1;
            if max_items.is_some_and(|max| count >= max) {
                break;
            }
        }

        info!("Streamed {} items from {}", count, target);
        Ok(())
    }

    async fn token<W: Write>(
        &self,
        out: &mut W,
        settings: &Settings,
        scopes: &[String],
        force_refresh: bool,
    ) -> Result<()> {
        let scopes = (!scopes.is_empty()).then_some(scopes);

        let token = match &self.cli.access_token {
            Some(token) => StaticToken::new(token.as_str()).access_token(scopes).await?,
            None => {
                self.credentials(settings)?
                    .token(scopes, force_refresh)
                    .await?
            }
        };

        self.output_message(
            out,
            &json!({ "token_type": "Bearer", "access_token": token }),
        )
    }

    /// Client from the settings file and the selected token source
    fn build_client(&self, settings: &Settings) -> Result<GraphClient> {
        let config = settings.graph.to_client_config()?;
        let client = GraphClient::new(config, self.token_source(settings)?)?;
        Ok(client.with_log_sink(Arc::new(TracingSink)))
    }

    fn token_source(&self, settings: &Settings) -> Result<Arc<dyn TokenSource>> {
        match &self.cli.access_token {
            Some(token) => Ok(Arc::new(StaticToken::new(token.as_str()))),
            None => Ok(Arc::new(self.credentials(settings)?)),
        }
    }

    /// Credentials from the settings file, falling back to the environment
    fn credentials(&self, settings: &Settings) -> Result<ClientCredentials> {
        match &settings.azuread {
            Some(azuread) => ClientCredentials::from_settings(azuread),
            None => ClientCredentials::from_env(&self.cli.env_prefix).with_context(|| {
                "No azuread settings and no credentials in the environment \
                 (or pass --access-token)"
                    .to_string()
            }),
        }
    }

    /// Output a document
    fn output_message<W: Write>(&self, out: &mut W, msg: &JsonValue) -> Result<()> {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(msg)?,
        };
        writeln!(out, "{rendered}")?;
        Ok(())
    }
}

fn to_params(pairs: &[(String, String)]) -> QueryParams {
    pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}
