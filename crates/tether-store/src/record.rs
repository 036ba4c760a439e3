//! Lifecycle-tracked records.
//!
//! A [`Record`] is the canonical in-memory representation of one server
//! resource. Handles are `Arc<Record>`: every list, relationship, and UI
//! reference aliases the same instance, so an in-place mutation (a merge,
//! a delete) is visible everywhere without manual propagation. The `kind`
//! is immutable and the `id` is write-once -- assigned by the server on
//! first successful create, immutable thereafter.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use tether_wire::{Linkage, RawResource, RelationshipObject, ResourceKey};

/// Lifecycle state of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Locally constructed, never persisted; has no id.
    #[default]
    New,
    /// A create request is in flight.
    Saving,
    /// In sync with the server as far as the client knows.
    Persisted,
    /// Local attribute edits not yet acknowledged by the server.
    Dirty,
    /// A delete request is in flight.
    Deleting,
    /// Deleted on the server; evicted from the identity map.
    Deleted,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Saving => "saving",
            Self::Persisted => "persisted",
            Self::Dirty => "dirty",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Default)]
struct RecordData {
    attributes: BTreeMap<String, Value>,
    relationships: BTreeMap<String, Linkage>,
    lifecycle: Lifecycle,
}

/// The canonical in-memory representation of one resource.
pub struct Record {
    kind: String,
    id: OnceLock<String>,
    data: RwLock<RecordData>,
}

impl Record {
    /// A locally constructed, unpersisted record (lifecycle [`Lifecycle::New`]).
    pub(crate) fn new_local(
        kind: impl Into<String>,
        attributes: BTreeMap<String, Value>,
        relationships: BTreeMap<String, Linkage>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind: kind.into(),
            id: OnceLock::new(),
            data: RwLock::new(RecordData {
                attributes,
                relationships,
                lifecycle: Lifecycle::New,
            }),
        })
    }

    /// A record built from a server resource object (lifecycle
    /// [`Lifecycle::Persisted`]). The resource must carry an id.
    pub(crate) fn from_raw(raw: &RawResource) -> Arc<Self> {
        let id = raw.id.clone().expect("server resource carries an id");
        let record = Self {
            kind: raw.kind.clone(),
            id: OnceLock::new(),
            data: RwLock::new(RecordData {
                attributes: raw.attributes.clone(),
                relationships: raw
                    .relationships
                    .iter()
                    .map(|(name, rel)| (name.clone(), rel.data.clone()))
                    .collect(),
                lifecycle: Lifecycle::Persisted,
            }),
        };
        record.id.set(id).expect("fresh OnceLock");
        Arc::new(record)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The server-assigned id, or `None` while unpersisted.
    pub fn id(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }

    /// The `(type, id)` key, or `None` while unpersisted.
    pub fn key(&self) -> Option<ResourceKey> {
        self.id().map(|id| ResourceKey::new(self.kind.clone(), id))
    }

    /// Assign the server id. Panics if a different id was already set --
    /// ids are immutable once assigned.
    pub(crate) fn assign_id(&self, id: String) {
        if let Err(id) = self.id.set(id) {
            assert_eq!(
                self.id.get(),
                Some(&id),
                "record id is immutable once assigned"
            );
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.data.read().expect("record lock poisoned").lifecycle
    }

    pub(crate) fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.data.write().expect("record lock poisoned").lifecycle = lifecycle;
    }

    /// Current value of one attribute.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.data
            .read()
            .expect("record lock poisoned")
            .attributes
            .get(name)
            .cloned()
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.data.read().expect("record lock poisoned").attributes.clone()
    }

    /// Current linkage for the named relationship.
    pub fn linkage(&self, name: &str) -> Option<Linkage> {
        self.data
            .read()
            .expect("record lock poisoned")
            .relationships
            .get(name)
            .cloned()
    }

    /// Replace the linkage for one relationship. Returns `true` if it changed.
    pub(crate) fn set_linkage(&self, name: &str, linkage: Linkage) -> bool {
        let mut data = self.data.write().expect("record lock poisoned");
        if data.relationships.get(name) == Some(&linkage) {
            return false;
        }
        data.relationships.insert(name.to_string(), linkage);
        true
    }

    /// Merge a server resource object into this record in place: provided
    /// attributes and relationships overwrite, absent fields are untouched,
    /// lifecycle becomes [`Lifecycle::Persisted`]. Idempotent -- merging the
    /// same resource twice leaves the same observable state. Returns `true`
    /// if anything observable changed.
    pub(crate) fn merge_raw(&self, raw: &RawResource) -> bool {
        let mut data = self.data.write().expect("record lock poisoned");
        let mut changed = false;
        for (name, value) in &raw.attributes {
            if data.attributes.get(name) != Some(value) {
                data.attributes.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        for (name, rel) in &raw.relationships {
            if data.relationships.get(name) != Some(&rel.data) {
                data.relationships.insert(name.clone(), rel.data.clone());
                changed = true;
            }
        }
        if data.lifecycle != Lifecycle::Persisted {
            data.lifecycle = Lifecycle::Persisted;
            changed = true;
        }
        changed
    }

    /// Overwrite the given attributes, returning the full previous
    /// attribute snapshot for an exact revert.
    pub(crate) fn apply_attributes(
        &self,
        attributes: &BTreeMap<String, Value>,
    ) -> BTreeMap<String, Value> {
        let mut data = self.data.write().expect("record lock poisoned");
        let previous = data.attributes.clone();
        for (name, value) in attributes {
            data.attributes.insert(name.clone(), value.clone());
        }
        previous
    }

    /// Restore a previously taken attribute snapshot.
    pub(crate) fn restore_attributes(&self, snapshot: BTreeMap<String, Value>) {
        self.data.write().expect("record lock poisoned").attributes = snapshot;
    }

    /// Strip every linkage reference to `key`. Returns `true` if anything
    /// changed.
    pub(crate) fn unlink(&self, key: &ResourceKey) -> bool {
        let mut data = self.data.write().expect("record lock poisoned");
        let mut changed = false;
        for linkage in data.relationships.values_mut() {
            changed |= linkage.remove(key);
        }
        changed
    }

    /// The wire representation of this record's current state.
    pub(crate) fn to_raw(&self) -> RawResource {
        let data = self.data.read().expect("record lock poisoned");
        RawResource {
            kind: self.kind.clone(),
            id: self.id().map(str::to_string),
            attributes: data.attributes.clone(),
            relationships: data
                .relationships
                .iter()
                .map(|(name, linkage)| {
                    (name.clone(), RelationshipObject { data: linkage.clone() })
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("kind", &self.kind)
            .field("id", &self.id())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sushi_place() -> RawResource {
        RawResource::new("restaurants")
            .with_id("1")
            .with_attribute("name", "Sushi Place")
            .with_relationship(
                "dishes",
                Linkage::ToMany(vec![ResourceKey::new("dishes", "2")]),
            )
    }

    #[test]
    fn from_raw_is_persisted() {
        let record = Record::from_raw(&sushi_place());
        assert_eq!(record.lifecycle(), Lifecycle::Persisted);
        assert_eq!(record.key(), Some(ResourceKey::new("restaurants", "1")));
        assert_eq!(record.attribute("name"), Some(json!("Sushi Place")));
    }

    #[test]
    fn new_local_has_no_key() {
        let record = Record::new_local("restaurants", BTreeMap::new(), BTreeMap::new());
        assert_eq!(record.lifecycle(), Lifecycle::New);
        assert_eq!(record.id(), None);
        assert_eq!(record.key(), None);
    }

    #[test]
    fn assign_id_is_write_once() {
        let record = Record::new_local("restaurants", BTreeMap::new(), BTreeMap::new());
        record.assign_id("7".into());
        assert_eq!(record.id(), Some("7"));
        // Re-assigning the same id is a no-op.
        record.assign_id("7".into());
        assert_eq!(record.id(), Some("7"));
    }

    #[test]
    #[should_panic(expected = "immutable")]
    fn reassigning_a_different_id_panics() {
        let record = Record::new_local("restaurants", BTreeMap::new(), BTreeMap::new());
        record.assign_id("7".into());
        record.assign_id("8".into());
    }

    #[test]
    fn merge_overwrites_provided_fields_only() {
        let record = Record::from_raw(&sushi_place());
        let incoming = RawResource::new("restaurants")
            .with_id("1")
            .with_attribute("address", "123 Main Street");
        assert!(record.merge_raw(&incoming));
        // Old attribute untouched, new one added.
        assert_eq!(record.attribute("name"), Some(json!("Sushi Place")));
        assert_eq!(record.attribute("address"), Some(json!("123 Main Street")));
        assert!(record.linkage("dishes").is_some());
    }

    #[test]
    fn merge_reports_no_change_when_identical() {
        let record = Record::from_raw(&sushi_place());
        assert!(!record.merge_raw(&sushi_place()));
    }

    #[test]
    fn merge_promotes_lifecycle_to_persisted() {
        let record = Record::new_local("restaurants", BTreeMap::new(), BTreeMap::new());
        record.assign_id("1".into());
        record.set_lifecycle(Lifecycle::Saving);
        record.merge_raw(&sushi_place());
        assert_eq!(record.lifecycle(), Lifecycle::Persisted);
    }

    #[test]
    fn apply_and_restore_attributes() {
        let record = Record::from_raw(&sushi_place());
        let mut edit = BTreeMap::new();
        edit.insert("name".to_string(), json!("Sushi Palace"));

        let snapshot = record.apply_attributes(&edit);
        assert_eq!(record.attribute("name"), Some(json!("Sushi Palace")));

        record.restore_attributes(snapshot);
        assert_eq!(record.attribute("name"), Some(json!("Sushi Place")));
    }

    #[test]
    fn unlink_strips_every_reference() {
        let record = Record::from_raw(
            &RawResource::new("restaurants")
                .with_id("1")
                .with_relationship(
                    "dishes",
                    Linkage::ToMany(vec![
                        ResourceKey::new("dishes", "2"),
                        ResourceKey::new("dishes", "3"),
                    ]),
                )
                .with_relationship(
                    "signature_dish",
                    Linkage::ToOne(Some(ResourceKey::new("dishes", "2"))),
                ),
        );
        assert!(record.unlink(&ResourceKey::new("dishes", "2")));
        assert_eq!(
            record.linkage("dishes"),
            Some(Linkage::ToMany(vec![ResourceKey::new("dishes", "3")]))
        );
        assert_eq!(record.linkage("signature_dish"), Some(Linkage::ToOne(None)));
        assert!(!record.unlink(&ResourceKey::new("dishes", "2")));
    }

    #[test]
    fn to_raw_roundtrips_current_state() {
        let record = Record::from_raw(&sushi_place());
        let raw = record.to_raw();
        assert_eq!(raw.key(), record.key());
        assert_eq!(raw.attributes, record.attributes());
    }

    // Strategy for JSON scalar attribute values.
    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ]
    }

    proptest! {
        // Merging the same normalized resource twice yields the same
        // observable state as merging it once, and the second merge
        // reports no change.
        #[test]
        fn merge_is_idempotent(
            attributes in proptest::collection::btree_map("[a-z]{1,6}", value_strategy(), 0..6)
        ) {
            let incoming = RawResource {
                kind: "restaurants".into(),
                id: Some("1".into()),
                attributes,
                relationships: BTreeMap::new(),
            };
            let record = Record::from_raw(&sushi_place());

            record.merge_raw(&incoming);
            let after_once = record.attributes();

            let changed = record.merge_raw(&incoming);
            prop_assert!(!changed);
            prop_assert_eq!(record.attributes(), after_once);
        }
    }
}
