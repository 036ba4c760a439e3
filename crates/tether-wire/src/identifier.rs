use serde::{Deserialize, Serialize};

/// The `(type, id)` identity of a persisted JSON:API resource.
///
/// Serializes as a resource identifier object: `{ "type": ..., "id": ... }`.
/// The `type` field is named `kind` in Rust because `type` is reserved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_kind_slash_id() {
        let key = ResourceKey::new("restaurants", "1");
        assert_eq!(key.to_string(), "restaurants/1");
    }

    #[test]
    fn serializes_with_type_field() {
        let key = ResourceKey::new("dishes", "42");
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "dishes", "id": "42" }));
    }

    #[test]
    fn deserializes_from_identifier_object() {
        let key: ResourceKey =
            serde_json::from_value(serde_json::json!({ "type": "dishes", "id": "7" })).unwrap();
        assert_eq!(key, ResourceKey::new("dishes", "7"));
    }

    #[test]
    fn ordering_is_by_kind_then_id() {
        let mut keys = vec![
            ResourceKey::new("dishes", "2"),
            ResourceKey::new("restaurants", "1"),
            ResourceKey::new("dishes", "1"),
        ];
        keys.sort();
        assert_eq!(keys[0], ResourceKey::new("dishes", "1"));
        assert_eq!(keys[2], ResourceKey::new("restaurants", "1"));
    }
}
