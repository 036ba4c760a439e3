//! Collection query state.
//!
//! Each `find_all`/`load_related` cache key owns a [`CollectionState`]:
//! loading/error flags, the ordered member list, and a generation token.
//! States are created on first load and cached for the store's lifetime
//! unless explicitly invalidated. The generation token is how abandoned
//! loads are kept from resurrecting state that was invalidated while they
//! were in flight.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tether_wire::{Query, ResourceKey};

use crate::error::StoreError;
use crate::record::Record;

/// Cache key for one collection query state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// `find_all(kind, query)` -- `query` is the canonical encoding.
    All { kind: String, query: String },
    /// `load_related(parent, name)`.
    Related { parent: ResourceKey, name: String },
}

impl QueryKey {
    pub fn all(kind: impl Into<String>, query: &Query) -> Self {
        Self::All {
            kind: kind.into(),
            query: query.canonical(),
        }
    }

    /// The base unfiltered collection for a kind.
    pub fn all_base(kind: impl Into<String>) -> Self {
        Self::all(kind, &Query::default())
    }

    pub fn related(parent: ResourceKey, name: impl Into<String>) -> Self {
        Self::Related {
            parent,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All { kind, query } if query.is_empty() => write!(f, "{kind}"),
            Self::All { kind, query } => write!(f, "{kind}?{query}"),
            Self::Related { parent, name } => write!(f, "{parent}/{name}"),
        }
    }
}

/// Mutable bookkeeping for one cache key.
#[derive(Clone, Debug, Default)]
pub(crate) struct CollectionState {
    pub loading: bool,
    /// Completed at least one successful load.
    pub loaded: bool,
    pub error: Option<StoreError>,
    pub members: Vec<ResourceKey>,
    /// Bumped on invalidation; responses captured under an older
    /// generation are discarded on arrival.
    pub generation: u64,
}

/// All collection states, keyed by [`QueryKey`].
#[derive(Default)]
pub(crate) struct CollectionCache {
    states: RwLock<HashMap<QueryKey, CollectionState>>,
}

impl CollectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<CollectionState> {
        self.states.read().expect("cache lock poisoned").get(key).cloned()
    }

    /// Ensure a state exists, mark it loading, and return the generation
    /// the caller's load runs under.
    pub fn begin_load(&self, key: &QueryKey) -> u64 {
        let mut states = self.states.write().expect("cache lock poisoned");
        let state = states.entry(key.clone()).or_default();
        state.loading = true;
        state.generation
    }

    /// Apply `apply` to the state iff it still exists at `generation`.
    /// Returns `false` (without applying) for a stale or missing state.
    pub fn complete_if_current<F>(&self, key: &QueryKey, generation: u64, apply: F) -> bool
    where
        F: FnOnce(&mut CollectionState),
    {
        let mut states = self.states.write().expect("cache lock poisoned");
        match states.get_mut(key) {
            Some(state) if state.generation == generation => {
                apply(state);
                true
            }
            _ => false,
        }
    }

    /// Apply `apply` to an existing state. Returns `false` if absent.
    pub fn update<F>(&self, key: &QueryKey, apply: F) -> bool
    where
        F: FnOnce(&mut CollectionState),
    {
        let mut states = self.states.write().expect("cache lock poisoned");
        match states.get_mut(key) {
            Some(state) => {
                apply(state);
                true
            }
            None => false,
        }
    }

    /// Bump the generation and clear loaded data so the next read
    /// refetches. No-op for keys never loaded.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.update(key, |state| {
            state.generation += 1;
            state.loaded = false;
            state.loading = false;
            state.members.clear();
            state.error = None;
        })
    }

    /// Append a member to one state if that state has completed a load and
    /// does not already contain it.
    pub fn append_member(&self, key: &QueryKey, member: &ResourceKey) -> bool {
        self.update(key, |state| {
            if state.loaded && !state.members.contains(member) {
                state.members.push(member.clone());
            }
        }) && self
            .get(key)
            .is_some_and(|state| state.members.contains(member))
    }

    /// Remove a member from every state. Returns the keys that changed.
    pub fn remove_member(&self, member: &ResourceKey) -> Vec<QueryKey> {
        let mut states = self.states.write().expect("cache lock poisoned");
        let mut touched = Vec::new();
        for (key, state) in states.iter_mut() {
            let before = state.members.len();
            state.members.retain(|m| m != member);
            if state.members.len() != before {
                touched.push(key.clone());
            }
        }
        touched
    }

    pub fn len(&self) -> usize {
        self.states.read().expect("cache lock poisoned").len()
    }

    pub fn clear(&self) {
        self.states.write().expect("cache lock poisoned").clear();
    }
}

impl std::fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCache")
            .field("state_count", &self.len())
            .finish()
    }
}

/// A read-only snapshot of one collection, with members resolved to
/// canonical record handles.
#[derive(Clone, Debug)]
pub struct Collection {
    pub key: QueryKey,
    pub loading: bool,
    pub error: Option<StoreError>,
    records: Vec<Arc<Record>>,
}

impl Collection {
    pub(crate) fn new(
        key: QueryKey,
        loading: bool,
        error: Option<StoreError>,
        records: Vec<Arc<Record>>,
    ) -> Self {
        Self {
            key,
            loading,
            error,
            records,
        }
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
