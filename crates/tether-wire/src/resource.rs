use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifier::ResourceKey;

/// Relationship linkage data: which resource(s) a relationship points at.
///
/// `null` decodes as an empty to-one, an array as a to-many. The variants
/// are untagged because the JSON:API shape itself is the discriminant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    ToMany(Vec<ResourceKey>),
    ToOne(Option<ResourceKey>),
}

impl Linkage {
    /// All keys referenced by this linkage, in order.
    pub fn keys(&self) -> Vec<ResourceKey> {
        match self {
            Self::ToMany(keys) => keys.clone(),
            Self::ToOne(Some(key)) => vec![key.clone()],
            Self::ToOne(None) => Vec::new(),
        }
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        match self {
            Self::ToMany(keys) => keys.contains(key),
            Self::ToOne(target) => target.as_ref() == Some(key),
        }
    }

    /// Remove every reference to `key`. Returns `true` if anything changed.
    /// A to-one pointing at `key` becomes an empty to-one.
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        match self {
            Self::ToMany(keys) => {
                let before = keys.len();
                keys.retain(|k| k != key);
                keys.len() != before
            }
            Self::ToOne(target) => {
                if target.as_ref() == Some(key) {
                    *target = None;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// A relationship object as it appears on the wire: `{ "data": <linkage> }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipObject {
    pub data: Linkage,
}

impl RelationshipObject {
    pub fn to_one(key: Option<ResourceKey>) -> Self {
        Self {
            data: Linkage::ToOne(key),
        }
    }

    pub fn to_many(keys: Vec<ResourceKey>) -> Self {
        Self {
            data: Linkage::ToMany(keys),
        }
    }
}

/// A resource object as it appears on the wire.
///
/// `id` is absent only in `POST` request bodies for client-created
/// resources; every resource in a response carries one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, RelationshipObject>,
}

impl RawResource {
    /// A new resource object with no id and no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, linkage: Linkage) -> Self {
        self.relationships
            .insert(name.into(), RelationshipObject { data: linkage });
        self
    }

    /// The `(type, id)` key, or `None` for an unpersisted resource.
    pub fn key(&self) -> Option<ResourceKey> {
        self.id
            .as_ref()
            .map(|id| ResourceKey::new(self.kind.clone(), id.clone()))
    }

    /// Linkage for the named relationship, if present.
    pub fn linkage(&self, name: &str) -> Option<&Linkage> {
        self.relationships.get(name).map(|rel| &rel.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dish(id: &str) -> ResourceKey {
        ResourceKey::new("dishes", id)
    }

    #[test]
    fn to_one_linkage_roundtrip() {
        let linkage = Linkage::ToOne(Some(ResourceKey::new("restaurants", "1")));
        let json = serde_json::to_value(&linkage).unwrap();
        assert_eq!(json, json!({ "type": "restaurants", "id": "1" }));
        let back: Linkage = serde_json::from_value(json).unwrap();
        assert_eq!(back, linkage);
    }

    #[test]
    fn empty_to_one_is_null() {
        let linkage = Linkage::ToOne(None);
        let json = serde_json::to_value(&linkage).unwrap();
        assert_eq!(json, Value::Null);
        let back: Linkage = serde_json::from_value(json).unwrap();
        assert_eq!(back, linkage);
    }

    #[test]
    fn to_many_linkage_roundtrip() {
        let linkage = Linkage::ToMany(vec![dish("1"), dish("2")]);
        let json = serde_json::to_value(&linkage).unwrap();
        let back: Linkage = serde_json::from_value(json).unwrap();
        assert_eq!(back, linkage);
        assert_eq!(back.keys().len(), 2);
    }

    #[test]
    fn empty_array_decodes_as_to_many() {
        let back: Linkage = serde_json::from_value(json!([])).unwrap();
        assert_eq!(back, Linkage::ToMany(vec![]));
    }

    #[test]
    fn remove_from_to_many() {
        let mut linkage = Linkage::ToMany(vec![dish("1"), dish("2"), dish("1")]);
        assert!(linkage.remove(&dish("1")));
        assert_eq!(linkage, Linkage::ToMany(vec![dish("2")]));
        assert!(!linkage.remove(&dish("1")));
    }

    #[test]
    fn remove_from_to_one() {
        let mut linkage = Linkage::ToOne(Some(dish("3")));
        assert!(!linkage.remove(&dish("4")));
        assert!(linkage.remove(&dish("3")));
        assert_eq!(linkage, Linkage::ToOne(None));
    }

    #[test]
    fn resource_wire_shape() {
        let raw = RawResource::new("restaurants")
            .with_id("1")
            .with_attribute("name", "Sushi Place")
            .with_relationship("dishes", Linkage::ToMany(vec![dish("2")]));

        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "restaurants",
                "id": "1",
                "attributes": { "name": "Sushi Place" },
                "relationships": { "dishes": { "data": [{ "type": "dishes", "id": "2" }] } }
            })
        );
    }

    #[test]
    fn unpersisted_resource_omits_id() {
        let raw = RawResource::new("restaurants").with_attribute("name", "Taqueria");
        let json = serde_json::to_value(&raw).unwrap();
        assert!(json.get("id").is_none());
        assert!(raw.key().is_none());
    }

    #[test]
    fn key_and_linkage_accessors() {
        let raw = RawResource::new("dishes")
            .with_id("9")
            .with_relationship("restaurant", Linkage::ToOne(Some(ResourceKey::new(
                "restaurants",
                "1",
            ))));
        assert_eq!(raw.key(), Some(ResourceKey::new("dishes", "9")));
        assert!(raw.linkage("restaurant").unwrap().contains(&ResourceKey::new("restaurants", "1")));
        assert!(raw.linkage("reviews").is_none());
    }

    #[test]
    fn missing_maps_default_to_empty() {
        let raw: RawResource =
            serde_json::from_value(json!({ "type": "dishes", "id": "1" })).unwrap();
        assert!(raw.attributes.is_empty());
        assert!(raw.relationships.is_empty());
    }
}
