//! CLI commands and argument parsing

use crate::types::Method;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resilient Microsoft Graph client
#[derive(Parser, Debug)]
#[command(name = "graphfw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Prefix of the TENANT_ID/CLIENT_ID/CLIENT_SECRET environment variables,
    /// used when the settings file has no `azuread` section
    #[arg(long, global = true, default_value = "AZURE_")]
    pub env_prefix: String,

    /// Use this bearer token instead of the client-credentials flow
    #[arg(long, global = true)]
    pub access_token: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// GET a resource and print its JSON body
    Get {
        /// Path relative to the base URL, or an absolute URL
        target: String,

        /// Query parameter as key=value (`select` and `$select` are equivalent)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Force a ConsistencyLevel header value
        #[arg(long)]
        consistency_level: Option<String>,
    },

    /// Send a request with any method
    Request {
        /// HTTP method
        method: Method,

        /// Path relative to the base URL, or an absolute URL
        target: String,

        /// Query parameter as key=value
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Accepted status codes (default 200)
        #[arg(long = "expect")]
        expect: Vec<u16>,
    },

    /// Stream all items of a paged collection, one JSON document per line
    Pages {
        /// Path relative to the base URL, or an absolute URL
        target: String,

        /// Query parameter as key=value
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Page field holding the items
        #[arg(long, default_value = "value")]
        item_path: String,

        /// Print whole pages instead of items
        #[arg(long)]
        whole_pages: bool,

        /// Requested page size (sent as $top)
        #[arg(long)]
        page_size: Option<u32>,

        /// Stop after this many items
        #[arg(long)]
        max_items: Option<usize>,

        /// Force a ConsistencyLevel header value
        #[arg(long)]
        consistency_level: Option<String>,
    },

    /// Acquire an access token
    Token {
        /// Scope to request (repeatable; default is the Graph .default scope)
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Ignore any cached token
        #[arg(long)]
        force_refresh: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// Parse a `key=value` query parameter
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("select=id,displayName").unwrap(),
            ("select".to_string(), "id,displayName".to_string())
        );
        assert_eq!(
            parse_param("filter=mail eq 'a=b'").unwrap(),
            ("filter".to_string(), "mail eq 'a=b'".to_string())
        );
        assert_eq!(
            parse_param("search=").unwrap(),
            ("search".to_string(), String::new())
        );
        assert!(parse_param("select").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_cli_get() {
        let cli = Cli::try_parse_from([
            "graphfw",
            "get",
            "/users",
            "--param",
            "select=id",
            "-p",
            "$top=5",
            "--consistency-level",
            "eventual",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.env_prefix, "AZURE_");
        match cli.command {
            Commands::Get {
                target,
                params,
                consistency_level,
            } => {
                assert_eq!(target, "/users");
                assert_eq!(
                    params,
                    vec![
                        ("select".to_string(), "id".to_string()),
                        ("$top".to_string(), "5".to_string())
                    ]
                );
                assert_eq!(consistency_level.as_deref(), Some("eventual"));
            }
            other => panic!("Expected Get, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_request() {
        let cli = Cli::try_parse_from([
            "graphfw",
            "request",
            "post",
            "/groups",
            "--body",
            r#"{"displayName":"x"}"#,
            "--expect",
            "201",
            "--expect",
            "202",
        ])
        .unwrap();

        match cli.command {
            Commands::Request {
                method,
                body,
                expect,
                ..
            } => {
                assert_eq!(method, Method::POST);
                assert!(body.is_some());
                assert_eq!(expect, vec![201, 202]);
            }
            other => panic!("Expected Request, got {other:?}"),
        }

        assert!(Cli::try_parse_from(["graphfw", "request", "TRACE", "/x"]).is_err());
    }

    #[test]
    fn test_cli_pages_defaults() {
        let cli = Cli::try_parse_from(["graphfw", "--verbose", "pages", "/groups"]).unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Pages {
                item_path,
                whole_pages,
                page_size,
                max_items,
                ..
            } => {
                assert_eq!(item_path, "value");
                assert!(!whole_pages);
                assert_eq!(page_size, None);
                assert_eq!(max_items, None);
            }
            other => panic!("Expected Pages, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_token_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "graphfw",
            "token",
            "--scope",
            "User.Read",
            "--scope",
            "Mail.Read",
            "--config",
            "settings.json",
            "--format",
            "pretty",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("settings.json")));
        assert_eq!(cli.format, OutputFormat::Pretty);
        match cli.command {
            Commands::Token {
                scopes,
                force_refresh,
            } => {
                assert_eq!(scopes, vec!["User.Read", "Mail.Read"]);
                assert!(!force_refresh);
            }
            other => panic!("Expected Token, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_param() {
        let result = Cli::try_parse_from(["graphfw", "get", "/users", "--param", "select"]);
        assert!(result.is_err());
    }
}
