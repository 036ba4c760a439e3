use async_trait::async_trait;

use tether_wire::{Document, Query};

use crate::error::TransportResult;

/// HTTP method, restricted to the verbs the JSON:API contract uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// Per-request options: query parameters and an optional document body.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub query: Query,
    pub body: Option<Document>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Document) -> Self {
        self.body = Some(body);
        self
    }
}

/// The request capability the store consumes.
///
/// Implementations own everything below the document layer: base URL,
/// headers, auth, serialization to bytes. `path` is rooted at the API base
/// (e.g. `/restaurants/1`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> TransportResult<Document>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
