//! OData query module
//!
//! Everything that shapes the query string of a Graph request.
//!
//! # Overview
//!
//! - `QueryParams` - the canonical, resolved parameter map sent on the wire
//! - `QueryInput` - the accepted caller shapes (query text, pairs, map)
//! - `normalize_params` - `$`-prefixes known system query options
//! - `OData` / `Expand` - fluent builder for `$select`, `$expand`, `$filter`, ...

mod builder;
mod params;

pub use builder::{Expand, OData};
pub use params::{
    needs_consistency_level, normalize_key, normalize_params, QueryInput, QueryParams,
    KNOWN_QUERY_OPTIONS, ODATA_MARKER,
};
