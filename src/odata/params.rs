//! Query parameter types and normalization
//!
//! Graph accepts its system query options only with the `$` marker
//! (`$select`, `$filter`, ...). Callers may pass the bare names; they are
//! rewritten once here and nowhere else.

use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Marker character of OData system query options
pub const ODATA_MARKER: char = '$';

/// System query options that get the `$` marker when passed bare
pub const KNOWN_QUERY_OPTIONS: [&str; 8] = [
    "$select", "$expand", "$filter", "$orderby", "$top", "$skip", "$count", "$search",
];

/// Resolved query parameters for one request
///
/// Keys are kept sorted so the emitted query string is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> Option<String> {
        self.0.insert(key.into(), value.to_string())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Check whether a key is present (exact match)
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a parameter
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Return a copy with known option names `$`-prefixed
    #[must_use]
    pub fn normalized(&self) -> Self {
        normalize_params(self)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<BTreeMap<String, String>> for QueryParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// The shapes in which callers may hand over query parameters
///
/// Resolved into [`QueryParams`] at the boundary; nothing downstream looks
/// at the original shape again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    /// A raw query string such as `$select=id&$top=5` (leading `?` allowed)
    Text(String),
    /// Ordered key/value pairs; later duplicates win
    Pairs(Vec<(String, String)>),
    /// A ready map
    Map(BTreeMap<String, String>),
}

impl QueryInput {
    /// Resolve into the canonical parameter map (not yet normalized)
    pub fn resolve(self) -> QueryParams {
        match self {
            QueryInput::Text(text) => {
                let text = text.trim();
                let text = text.strip_prefix('?').unwrap_or(text);
                url::form_urlencoded::parse(text.as_bytes())
                    .filter(|(key, _)| !key.is_empty())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            }
            QueryInput::Pairs(pairs) => pairs.into_iter().collect(),
            QueryInput::Map(map) => QueryParams::from(map),
        }
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<Vec<(String, String)>> for QueryInput {
    fn from(pairs: Vec<(String, String)>) -> Self {
        QueryInput::Pairs(pairs)
    }
}

impl From<BTreeMap<String, String>> for QueryInput {
    fn from(map: BTreeMap<String, String>) -> Self {
        QueryInput::Map(map)
    }
}

impl From<QueryInput> for QueryParams {
    fn from(input: QueryInput) -> Self {
        input.resolve()
    }
}

/// Rewrite a bare option name to its `$` form if that form is known
pub fn normalize_key(key: &str) -> String {
    if KNOWN_QUERY_OPTIONS.contains(&key) {
        return key.to_string();
    }
    let marked = format!("{ODATA_MARKER}{key}");
    if KNOWN_QUERY_OPTIONS.contains(&marked.as_str()) {
        marked
    } else {
        key.to_string()
    }
}

/// Normalize all parameter names; unknown names pass through unchanged
///
/// When both `select` and `$select` are present the bare one wins, since it
/// sorts after the marked key.
pub fn normalize_params(params: &QueryParams) -> QueryParams {
    params
        .iter()
        .map(|(key, value)| (normalize_key(key), value.clone()))
        .collect()
}

/// Graph requires `ConsistencyLevel: eventual` for `$count` and `$search`
pub fn needs_consistency_level(params: &QueryParams) -> bool {
    ["$count", "$search", "count", "search"]
        .iter()
        .any(|key| params.contains_key(key))
}
