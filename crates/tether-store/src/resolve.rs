//! Relationship resolution.
//!
//! [`Resolver::resolve`] turns a record's relationship linkage into record
//! handles through the identity map. A referenced resource that is not
//! loaded yet resolves to an explicit [`RelatedEntry::NotLoaded`]
//! placeholder rather than blocking; populating it is the caller's job via
//! `load_related`/`find_record`. Resolution never mutates the map.

use std::sync::Arc;

use tether_wire::{Linkage, ResourceKey};

use crate::identity::IdentityMap;
use crate::record::Record;

/// One entry of a resolved relationship.
#[derive(Clone, Debug)]
pub enum RelatedEntry {
    /// The referenced record, canonical handle.
    Loaded(Arc<Record>),
    /// The reference is known but the record is not in the store.
    NotLoaded(ResourceKey),
}

impl RelatedEntry {
    pub fn record(&self) -> Option<&Arc<Record>> {
        match self {
            Self::Loaded(record) => Some(record),
            Self::NotLoaded(_) => None,
        }
    }

    pub fn key(&self) -> ResourceKey {
        match self {
            Self::Loaded(record) => record.key().expect("loaded record carries an id"),
            Self::NotLoaded(key) => key.clone(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// The result of resolving one relationship.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// No linkage is known for this relationship; nothing can be said
    /// until it is loaded.
    NotLoaded,
    /// A to-one relationship: `None` means explicitly empty.
    One(Option<RelatedEntry>),
    /// A to-many relationship, in linkage order.
    Many(Vec<RelatedEntry>),
}

impl Resolution {
    /// `true` when linkage is known and every referenced record is loaded.
    pub fn is_fully_loaded(&self) -> bool {
        match self {
            Self::NotLoaded => false,
            Self::One(None) => true,
            Self::One(Some(entry)) => entry.is_loaded(),
            Self::Many(entries) => entries.iter().all(RelatedEntry::is_loaded),
        }
    }
}

/// Read-only relationship resolver over a store's identity map.
#[derive(Clone)]
pub struct Resolver {
    map: Arc<IdentityMap>,
}

impl Resolver {
    pub(crate) fn new(map: Arc<IdentityMap>) -> Self {
        Self { map }
    }

    /// Resolve the named relationship on `record`.
    pub fn resolve(&self, record: &Record, name: &str) -> Resolution {
        match record.linkage(name) {
            None => Resolution::NotLoaded,
            Some(Linkage::ToOne(None)) => Resolution::One(None),
            Some(Linkage::ToOne(Some(key))) => Resolution::One(Some(self.entry(key))),
            Some(Linkage::ToMany(keys)) => {
                Resolution::Many(keys.into_iter().map(|key| self.entry(key)).collect())
            }
        }
    }

    fn entry(&self, key: ResourceKey) -> RelatedEntry {
        match self.map.get(&key) {
            Some(record) => RelatedEntry::Loaded(record),
            None => RelatedEntry::NotLoaded(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChangeHub;
    use tether_wire::RawResource;

    fn resolver_with(resources: Vec<RawResource>) -> (Resolver, Arc<IdentityMap>) {
        let map = Arc::new(IdentityMap::new(Arc::new(ChangeHub::new(16))));
        for raw in &resources {
            map.upsert(raw).unwrap();
        }
        (Resolver::new(map.clone()), map)
    }

    fn restaurant_with_dishes() -> RawResource {
        RawResource::new("restaurants")
            .with_id("1")
            .with_relationship(
                "dishes",
                Linkage::ToMany(vec![
                    ResourceKey::new("dishes", "2"),
                    ResourceKey::new("dishes", "3"),
                ]),
            )
            .with_relationship("owner", Linkage::ToOne(None))
    }

    #[test]
    fn unknown_relationship_is_not_loaded() {
        let (resolver, map) = resolver_with(vec![restaurant_with_dishes()]);
        let record = map.get(&ResourceKey::new("restaurants", "1")).unwrap();
        assert!(matches!(
            resolver.resolve(&record, "reviews"),
            Resolution::NotLoaded
        ));
    }

    #[test]
    fn empty_to_one_is_loaded_and_empty() {
        let (resolver, map) = resolver_with(vec![restaurant_with_dishes()]);
        let record = map.get(&ResourceKey::new("restaurants", "1")).unwrap();
        let resolution = resolver.resolve(&record, "owner");
        assert!(matches!(resolution, Resolution::One(None)));
        assert!(resolution.is_fully_loaded());
    }

    #[test]
    fn to_many_mixes_loaded_and_placeholders() {
        // Dish 2 is loaded, dish 3 is not.
        let (resolver, map) = resolver_with(vec![
            restaurant_with_dishes(),
            RawResource::new("dishes").with_id("2"),
        ]);
        let record = map.get(&ResourceKey::new("restaurants", "1")).unwrap();

        let Resolution::Many(entries) = resolver.resolve(&record, "dishes") else {
            panic!("expected to-many resolution");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_loaded());
        assert!(!entries[1].is_loaded());
        assert_eq!(entries[1].key(), ResourceKey::new("dishes", "3"));

        let resolution = resolver.resolve(&record, "dishes");
        assert!(!resolution.is_fully_loaded());
    }

    #[test]
    fn resolution_returns_canonical_handles() {
        let (resolver, map) = resolver_with(vec![
            restaurant_with_dishes(),
            RawResource::new("dishes")
                .with_id("2")
                .with_relationship(
                    "restaurant",
                    Linkage::ToOne(Some(ResourceKey::new("restaurants", "1"))),
                ),
        ]);
        let restaurant = map.get(&ResourceKey::new("restaurants", "1")).unwrap();
        let dish = map.get(&ResourceKey::new("dishes", "2")).unwrap();

        let Resolution::One(Some(entry)) = resolver.resolve(&dish, "restaurant") else {
            panic!("expected to-one resolution");
        };
        assert!(Arc::ptr_eq(entry.record().unwrap(), &restaurant));
    }

    #[test]
    fn resolution_does_not_mutate_the_map() {
        let (resolver, map) = resolver_with(vec![restaurant_with_dishes()]);
        let record = map.get(&ResourceKey::new("restaurants", "1")).unwrap();
        let before = map.len();
        resolver.resolve(&record, "dishes");
        assert_eq!(map.len(), before);
    }
}
