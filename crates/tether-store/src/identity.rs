//! The identity map.
//!
//! At most one live [`Record`] exists per `(type, id)` within one store.
//! [`IdentityMap::upsert`] merges an incoming server resource into the
//! existing instance in place -- the `Arc` handle is never replaced -- so
//! every alias observes the merge. An upsert that changes an existing
//! record's content emits a change event scoped to exactly that record.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tether_wire::{RawResource, ResourceKey, WireError};

use crate::error::StoreResult;
use crate::notify::{ChangeHub, Scope};
use crate::record::Record;

pub(crate) struct IdentityMap {
    records: RwLock<HashMap<ResourceKey, Arc<Record>>>,
    hub: Arc<ChangeHub>,
}

impl IdentityMap {
    pub fn new(hub: Arc<ChangeHub>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            hub,
        }
    }

    /// The canonical handle for a key, if loaded.
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Record>> {
        self.records.read().expect("map lock poisoned").get(key).cloned()
    }

    /// Insert or merge a server resource, returning the canonical handle.
    /// Idempotent: applying the same normalized resource twice yields the
    /// same observable state and emits no second event.
    pub fn upsert(&self, raw: &RawResource) -> StoreResult<Arc<Record>> {
        let key = raw
            .key()
            .ok_or_else(|| WireError::MissingId(raw.kind.clone()))?;

        let existing = self.get(&key);
        match existing {
            Some(record) => {
                if record.merge_raw(raw) {
                    self.hub.emit(Scope::Record(key));
                }
                Ok(record)
            }
            None => {
                let record = Record::from_raw(raw);
                self.records
                    .write()
                    .expect("map lock poisoned")
                    .insert(key, record.clone());
                Ok(record)
            }
        }
    }

    /// Adopt a record that acquired its id outside the map (a successful
    /// create). Panics if the key is already mapped to another instance.
    pub fn adopt(&self, record: Arc<Record>) {
        let key = record.key().expect("adopted record carries an id");
        let mut records = self.records.write().expect("map lock poisoned");
        if let Some(existing) = records.get(&key) {
            assert!(
                Arc::ptr_eq(existing, &record),
                "identity map already holds a different instance for {key}"
            );
            return;
        }
        records.insert(key, record);
    }

    pub fn remove(&self, key: &ResourceKey) -> Option<Arc<Record>> {
        self.records.write().expect("map lock poisoned").remove(key)
    }

    /// Snapshot of every live record.
    pub fn all(&self) -> Vec<Arc<Record>> {
        self.records
            .read()
            .expect("map lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("map lock poisoned").len()
    }

    pub fn clear(&self) {
        self.records.write().expect("map lock poisoned").clear();
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap")
            .field("record_count", &self.len())
            .finish()
    }
}
