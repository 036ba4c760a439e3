use std::collections::BTreeMap;

/// Query parameters for a request.
///
/// `include` is the only parameter Tether interprets (relationship paths for
/// compound documents). Everything else -- pagination, sorting, filters --
/// passes through opaquely. The canonical encoding is deterministic
/// (`include` first, then params in key order) because it doubles as a
/// cache-key component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub include: Vec<String>,
    pub params: BTreeMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship path to `include`.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include.push(path.into());
        self
    }

    /// Add an opaque passthrough parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.params.is_empty()
    }

    /// Canonical query-string encoding, without the leading `?`.
    pub fn canonical(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.params.len());
        if !self.include.is_empty() {
            parts.push(format!("include={}", self.include.join(",")));
        }
        for (name, value) in &self.params {
            parts.push(format!("{name}={value}"));
        }
        parts.join("&")
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_encodes_empty() {
        assert!(Query::new().is_empty());
        assert_eq!(Query::new().canonical(), "");
    }

    #[test]
    fn include_paths_are_comma_joined() {
        let query = Query::new().include("dishes").include("dishes.reviews");
        assert_eq!(query.canonical(), "include=dishes,dishes.reviews");
    }

    #[test]
    fn params_encode_in_key_order() {
        let query = Query::new()
            .param("sort", "name")
            .param("page[size]", "10")
            .param("filter[name]", "sushi");
        assert_eq!(
            query.canonical(),
            "filter[name]=sushi&page[size]=10&sort=name"
        );
    }

    #[test]
    fn include_precedes_params() {
        let query = Query::new().param("sort", "name").include("dishes");
        assert_eq!(query.canonical(), "include=dishes&sort=name");
    }

    #[test]
    fn canonical_is_insertion_order_independent() {
        let a = Query::new().param("a", "1").param("b", "2");
        let b = Query::new().param("b", "2").param("a", "1");
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a, b);
    }
}
