//! Requested relation trees.
//!
//! An [`IncludeTree`] is an ordered list, not a map: requesting the same
//! relation twice among siblings is a caller error the resolver reports, so the
//! duplicate has to survive construction. The JSON form keeps duplicate keys
//! for the same reason:
//!
//! ```json
//! {
//!   "manager": true,
//!   "posts": {
//!     "columns": ["id", "title"],
//!     "filter": { "published": true },
//!     "include": { "comments": true },
//!     "lazy": false
//!   }
//! }
//! ```

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;

/// One requested relation with its options.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Include {
    pub relation: String,
    /// Target columns to select; all columns when `None`.
    pub columns: Option<Vec<String>>,
    /// Narrows attached children. Never drops parent rows.
    pub filter: Option<Filter>,
    /// Overrides the relation's default load strategy.
    pub lazy: Option<bool>,
    pub include: IncludeTree,
}

impl Include {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            columns: None,
            filter: None,
            lazy: None,
            include: IncludeTree::new(),
        }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }

    /// Add a nested include.
    pub fn include(mut self, child: Include) -> Self {
        self.include.push(child);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeTree(Vec<Include>);

impl IncludeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, include: Include) -> Self {
        self.0.push(include);
        self
    }

    pub fn push(&mut self, include: Include) {
        self.0.push(include);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Include> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse the JSON form from text. Duplicate keys are preserved.
    pub fn from_json_str(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(|e| QueryError::InvalidQuery(format!("include: {}", e)))
    }
}

impl FromIterator<Include> for IncludeTree {
    fn from_iter<I: IntoIterator<Item = Include>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a IncludeTree {
    type Item = &'a Include;
    type IntoIter = std::slice::Iter<'a, Include>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Deserialization
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum IncludeValue {
    Flag(bool),
    Options(IncludeOptions),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeOptions {
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    filter: Option<serde_json::Value>,
    #[serde(default)]
    include: Option<IncludeTree>,
    #[serde(default)]
    lazy: Option<bool>,
}

struct IncludeTreeVisitor;

impl<'de> Visitor<'de> for IncludeTreeVisitor {
    type Value = IncludeTree;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of relation names to `true` or include options")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<IncludeTree, A::Error> {
        let mut tree = IncludeTree::new();
        while let Some(relation) = map.next_key::<String>()? {
            match map.next_value::<IncludeValue>()? {
                IncludeValue::Flag(false) => {}
                IncludeValue::Flag(true) => tree.push(Include::new(relation)),
                IncludeValue::Options(opts) => {
                    let filter = opts
                        .filter
                        .as_ref()
                        .map(Filter::from_json)
                        .transpose()
                        .map_err(de::Error::custom)?;
                    tree.push(Include {
                        relation,
                        columns: opts.columns,
                        filter,
                        lazy: opts.lazy,
                        include: opts.include.unwrap_or_default(),
                    });
                }
            }
        }
        Ok(tree)
    }
}

impl<'de> Deserialize<'de> for IncludeTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(IncludeTreeVisitor)
    }
}
