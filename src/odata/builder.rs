//! Fluent builder for OData system query options

use super::params::QueryParams;
use std::fmt;

fn join_csv<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn trimmed(value: impl Into<String>) -> String {
    value.into().trim().to_string()
}

/// One `$expand` entry with optional nested options
///
/// Renders as `fields($select=ID,Title;$top=5)`; without options only the
/// entity name is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expand {
    pub entity: String,
    pub select: Vec<String>,
    pub orderby: Option<String>,
    pub filter: Option<String>,
    pub top: Option<u32>,
    pub count: Option<bool>,
    pub search: Option<String>,
}

impl Expand {
    /// Expand a navigation property
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: trimmed(entity),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn orderby(mut self, expr: impl Into<String>) -> Self {
        self.orderby = Some(trimmed(expr));
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(trimmed(expr));
        self
    }

    #[must_use]
    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    #[must_use]
    pub fn count(mut self, enabled: bool) -> Self {
        self.count = Some(enabled);
        self
    }

    /// `$search` inside an expand also needs eventual consistency on the request
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(trimmed(term));
        self
    }
}

impl fmt::Display for Expand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut opts = Vec::new();
        let select = join_csv(&self.select);
        if !select.is_empty() {
            opts.push(format!("$select={select}"));
        }
        if let Some(orderby) = self.orderby.as_deref().filter(|s| !s.is_empty()) {
            opts.push(format!("$orderby={orderby}"));
        }
        if let Some(filter) = self.filter.as_deref().filter(|s| !s.is_empty()) {
            opts.push(format!("$filter={filter}"));
        }
        if let Some(top) = self.top {
            opts.push(format!("$top={top}"));
        }
        if let Some(count) = self.count {
            opts.push(format!("$count={count}"));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            opts.push(format!("$search={search}"));
        }

        if opts.is_empty() {
            write!(f, "{}", self.entity)
        } else {
            write!(f, "{}({})", self.entity, opts.join(";"))
        }
    }
}

/// Fluent builder for Graph query parameters
///
/// ```
/// use graphfw::odata::{Expand, OData};
///
/// let params = OData::new()
///     .select(["id", "displayName"])
///     .expand(Expand::new("members").select(["id", "userPrincipalName"]))
///     .filter("accountEnabled eq true")
///     .top(100)
///     .to_params();
///
/// assert_eq!(params.get("$select"), Some("id,displayName"));
/// assert_eq!(params.get("$expand"), Some("members($select=id,userPrincipalName)"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OData {
    select: Vec<String>,
    expand: Vec<Expand>,
    filter: Option<String>,
    orderby: Option<String>,
    search: Option<String>,
    count: Option<bool>,
    top: Option<u32>,
    skip: Option<u32>,
}

impl OData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fields to `$select`; blank names are dropped
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(
            fields
                .into_iter()
                .map(trimmed)
                .filter(|f| !f.is_empty()),
        );
        self
    }

    #[must_use]
    pub fn expand(mut self, expand: Expand) -> Self {
        self.expand.push(expand);
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(trimmed(expr));
        self
    }

    #[must_use]
    pub fn orderby(mut self, expr: impl Into<String>) -> Self {
        self.orderby = Some(trimmed(expr));
        self
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(trimmed(term));
        self
    }

    #[must_use]
    pub fn count(mut self, enabled: bool) -> Self {
        self.count = Some(enabled);
        self
    }

    #[must_use]
    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u32) -> Self {
        self.skip = Some(n);
        self
    }

    /// Render the collected options as `$`-prefixed query parameters
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if !self.select.is_empty() {
            params.insert("$select", join_csv(&self.select));
        }
        if !self.expand.is_empty() {
            let expand = self
                .expand
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            params.insert("$expand", expand);
        }
        if let Some(filter) = self.filter.as_deref().filter(|s| !s.is_empty()) {
            params.insert("$filter", filter);
        }
        if let Some(orderby) = self.orderby.as_deref().filter(|s| !s.is_empty()) {
            params.insert("$orderby", orderby);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.insert("$search", search);
        }
        if let Some(count) = self.count {
            params.insert("$count", count);
        }
        if let Some(top) = self.top {
            params.insert("$top", top);
        }
        if let Some(skip) = self.skip {
            params.insert("$skip", skip);
        }
        params
    }
}

impl From<OData> for QueryParams {
    fn from(query: OData) -> Self {
        query.to_params()
    }
}
