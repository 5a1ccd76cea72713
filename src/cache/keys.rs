//! Cache key and tag definitions.
//!
//! `QueryKey` addresses one cache entry; `Tag` labels entries for bulk invalidation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::form_urlencoded;

/// Identifies a parameterized read against one endpoint.
///
/// Parameters live in a `BTreeMap`, so two keys built with the same pairs in a
/// different order compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter. A later value for the same name replaces the earlier one.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add a parameter only when `value` is present and non-empty.
    #[must_use]
    pub fn with_optional_param(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.with_param(name, v),
            _ => self,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Render as `endpoint?k=v&...` with parameters in canonical order.
    pub fn path_and_query(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{query}", self.endpoint)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_and_query())
    }
}

/// The resource family a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Product,
    Category,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::Category => "Category",
        }
    }
}

/// Collection-level or entity-level scope of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagScope {
    List,
    Search,
    Id(String),
}

/// Invalidation label attached to cache entries, rendered as `Kind:SCOPE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub kind: ResourceKind,
    pub scope: TagScope,
}

impl Tag {
    pub fn list(kind: ResourceKind) -> Self {
        Self {
            kind,
            scope: TagScope::List,
        }
    }

    pub fn search(kind: ResourceKind) -> Self {
        Self {
            kind,
            scope: TagScope::Search,
        }
    }

    pub fn entity(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            scope: TagScope::Id(id.into()),
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self.scope, TagScope::Id(_))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.as_str();
        match &self.scope {
            TagScope::List => write!(f, "{kind}:LIST"),
            TagScope::Search => write!(f, "{kind}:SEARCH"),
            TagScope::Id(id) => write!(f, "{kind}:{id}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid cache tag `{0}`")]
pub struct TagParseError(String);

impl FromStr for Tag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, scope) = s
            .split_once(':')
            .ok_or_else(|| TagParseError(s.to_string()))?;
        let kind = match kind {
            "Product" => ResourceKind::Product,
            "Category" => ResourceKind::Category,
            _ => return Err(TagParseError(s.to_string())),
        };
        let scope = match scope {
            "" => return Err(TagParseError(s.to_string())),
            "LIST" => TagScope::List,
            "SEARCH" => TagScope::Search,
            id => TagScope::Id(id.to_string()),
        };
        Ok(Self { kind, scope })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn param_order_does_not_affect_equality() {
        let a = QueryKey::new("/products")
            .with_param("offset", 0)
            .with_param("limit", 20);
        let b = QueryKey::new("/products")
            .with_param("limit", 20)
            .with_param("offset", 0);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_values_are_different_keys() {
        let a = QueryKey::new("/products").with_param("offset", 0);
        let b = QueryKey::new("/products").with_param("offset", 20);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_optional_param_is_omitted() {
        let key = QueryKey::new("/products").with_optional_param("categoryId", Some(""));
        assert_eq!(key, QueryKey::new("/products"));
        let key = QueryKey::new("/products").with_optional_param("categoryId", None);
        assert!(key.params().is_empty());
    }

    #[test]
    fn path_and_query_is_canonical_and_encoded() {
        let key = QueryKey::new("/products/search").with_param("searchedText", "red shoe&co");
        assert_eq!(
            key.path_and_query(),
            "/products/search?searchedText=red+shoe%26co"
        );
        let key = QueryKey::new("/products")
            .with_param("offset", 0)
            .with_param("limit", 10);
        assert_eq!(key.to_string(), "/products?limit=10&offset=0");
    }

    #[test]
    fn tags_render_and_parse() {
        assert_eq!(Tag::list(ResourceKind::Product).to_string(), "Product:LIST");
        assert_eq!(
            Tag::search(ResourceKind::Category).to_string(),
            "Category:SEARCH"
        );
        assert_eq!(
            Tag::entity(ResourceKind::Product, "42").to_string(),
            "Product:42"
        );
        assert_eq!(
            "Product:42".parse::<Tag>(),
            Ok(Tag::entity(ResourceKind::Product, "42"))
        );
        assert!("Widget:LIST".parse::<Tag>().is_err());
        assert!("Product:".parse::<Tag>().is_err());
        assert!(Tag::list(ResourceKind::Product).is_collection());
        assert!(!Tag::entity(ResourceKind::Product, "1").is_collection());
    }
}
