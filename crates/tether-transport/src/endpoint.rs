//! URL path construction for the JSON:API endpoint conventions.

/// `GET|POST /:kind`
pub fn collection(kind: &str) -> String {
    format!("/{kind}")
}

/// `GET|PATCH|DELETE /:kind/:id`
pub fn resource(kind: &str, id: &str) -> String {
    format!("/{kind}/{id}")
}

/// `GET /:kind/:id/:name` -- the related-resource endpoint.
pub fn related(kind: &str, id: &str, name: &str) -> String {
    format!("/{kind}/{id}/{name}")
}
