//! The store façade.
//!
//! A [`Store`] coordinates the identity map, collection cache, relationship
//! resolver, and change hub behind the injected [`Transport`]. It is
//! constructed explicitly and passed where it is needed -- there is no
//! global instance.
//!
//! Concurrency: operations are async tasks that suspend only at the
//! transport call; all cache mutation happens synchronously on resume, so
//! no lock is held across an await. Two in-flight `update`s on one record
//! are not serialized -- the last response to arrive wins. Loads with
//! identical cache keys coalesce into a single transport request.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use tether_transport::{endpoint, Method, RequestOptions, Transport, TransportResult};
use tether_wire::{Document, Linkage, PrimaryData, Query, RawResource, ResourceKey, WireError};

use crate::collection::{Collection, CollectionCache, QueryKey};
use crate::error::{StoreError, StoreResult};
use crate::identity::IdentityMap;
use crate::inflight::{FetchKey, InflightRegistry, Join};
use crate::normalize::normalize;
use crate::notify::{ChangeHub, ChangeStream, Interest, Scope};
use crate::record::{Lifecycle, Record};
use crate::resolve::Resolver;

/// Whether `find_record` with an `include` trusts cached records or
/// forces a refetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IncludePolicy {
    /// A cached record satisfies the call even when `include` is present.
    #[default]
    TrustCache,
    /// A non-empty `include` always hits the network.
    Refetch,
}

/// Configuration for a [`Store`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Capacity of per-subscriber change channels.
    pub channel_capacity: usize,
    pub include_policy: IncludePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            include_policy: IncludePolicy::default(),
        }
    }
}

/// Options for `find_all` / `find_record`.
#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub query: Query,
    /// Force a network fetch even when cached.
    pub reload: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn reload() -> Self {
        Self {
            reload: true,
            ..Self::default()
        }
    }
}

/// A reactive resource store mirroring a JSON:API backend.
pub struct Store {
    transport: Arc<dyn Transport>,
    identity: Arc<IdentityMap>,
    collections: Arc<CollectionCache>,
    hub: Arc<ChangeHub>,
    inflight: Arc<InflightRegistry>,
    config: StoreConfig,
}

impl Store {
    pub fn new(transport: Arc<dyn Transport>, config: StoreConfig) -> Self {
        let hub = Arc::new(ChangeHub::new(config.channel_capacity));
        Self {
            identity: Arc::new(IdentityMap::new(hub.clone())),
            collections: Arc::new(CollectionCache::new()),
            inflight: Arc::new(InflightRegistry::new()),
            hub,
            transport,
            config,
        }
    }

    /// A store with default configuration.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, StoreConfig::default())
    }

    // ---- Queries ----

    /// Load the collection of `kind` matching `options.query`.
    ///
    /// A cached, non-invalidated key returns its snapshot without a
    /// network call; `options.reload` forces one. Transport failures do
    /// not surface as an `Err` here -- they are recorded on the returned
    /// collection's `error`, and previously loaded members stay visible.
    pub async fn find_all(&self, kind: &str, options: FindOptions) -> Collection {
        let key = QueryKey::all(kind, &options.query);

        if !options.reload {
            if let Some(state) = self.collections.get(&key) {
                if state.loaded && !state.loading {
                    return self.snapshot(&key);
                }
            }
        }

        match self.inflight.join(FetchKey::Query(key.clone())) {
            Join::Waiter(mut receiver) => {
                let _ = receiver.changed().await;
                self.snapshot(&key)
            }
            Join::Leader(_guard) => {
                let generation = self.collections.begin_load(&key);
                self.hub.emit(Scope::Collection(key.clone()));
                debug!(%key, "collection load started");
                let result = self
                    .transport
                    .request(
                        Method::Get,
                        &endpoint::collection(kind),
                        RequestOptions::new().with_query(options.query.clone()),
                    )
                    .await;
                self.apply_load(&key, generation, kind, result);
                self.snapshot(&key)
            }
        }
    }

    /// Fetch one record, returning the identity-mapped instance when it is
    /// already loaded (subject to the include policy and `reload`).
    pub async fn find_record(
        &self,
        kind: &str,
        id: &str,
        options: FindOptions,
    ) -> StoreResult<Arc<Record>> {
        let key = ResourceKey::new(kind, id);
        let force = options.reload
            || (!options.query.include.is_empty()
                && self.config.include_policy == IncludePolicy::Refetch);
        if !force {
            if let Some(record) = self.identity.get(&key) {
                return Ok(record);
            }
        }

        let fetch_key = FetchKey::Record {
            key: key.clone(),
            query: options.query.canonical(),
        };
        match self.inflight.join(fetch_key) {
            Join::Waiter(mut receiver) => {
                let _ = receiver.changed().await;
                match self.identity.get(&key) {
                    Some(record) => Ok(record),
                    // The leader failed; fetch on our own behalf.
                    None => self.fetch_record(&key, &options.query).await,
                }
            }
            Join::Leader(_guard) => self.fetch_record(&key, &options.query).await,
        }
    }

    async fn fetch_record(&self, key: &ResourceKey, query: &Query) -> StoreResult<Arc<Record>> {
        let path = endpoint::resource(&key.kind, &key.id);
        debug!(%key, "record fetch started");
        let document = self
            .transport
            .request(
                Method::Get,
                &path,
                RequestOptions::new().with_query(query.clone()),
            )
            .await
            .map_err(|error| StoreError::classify(error, &key.to_string()))?;

        let primary = normalize(&self.identity, &document)?;
        let primary_key = primary.first().ok_or(StoreError::Wire(WireError::NoPrimaryData))?;
        self.identity
            .get(primary_key)
            .ok_or(StoreError::Wire(WireError::NoPrimaryData))
    }

    /// Load the records related to `parent` through `name`.
    ///
    /// When the parent's linkage is known and every referenced record is
    /// loaded, the collection is populated from cache; otherwise the
    /// related-resource endpoint is fetched and the parent's linkage
    /// refreshed from the response. Failures are recorded on the returned
    /// collection's `error`.
    ///
    /// Panics if `parent` is unpersisted.
    pub async fn load_related(&self, parent: &Arc<Record>, name: &str) -> Collection {
        let parent_key = persisted_key(parent, "load_related");
        let key = QueryKey::related(parent_key.clone(), name);

        if let Some(state) = self.collections.get(&key) {
            if state.loaded && !state.loading {
                return self.snapshot(&key);
            }
        }

        // Linkage path: everything referenced is already loaded.
        if let Some(linkage) = parent.linkage(name) {
            let members = linkage.keys();
            if members.iter().all(|k| self.identity.get(k).is_some()) {
                let generation = self.collections.begin_load(&key);
                self.collections.complete_if_current(&key, generation, |state| {
                    state.loading = false;
                    state.loaded = true;
                    state.error = None;
                    state.members = members;
                });
                self.hub.emit(Scope::Collection(key.clone()));
                return self.snapshot(&key);
            }
        }

        match self.inflight.join(FetchKey::Query(key.clone())) {
            Join::Waiter(mut receiver) => {
                let _ = receiver.changed().await;
                self.snapshot(&key)
            }
            Join::Leader(_guard) => {
                let generation = self.collections.begin_load(&key);
                self.hub.emit(Scope::Collection(key.clone()));
                debug!(%key, "related load started");
                let path = endpoint::related(&parent_key.kind, &parent_key.id, name);
                let result = self
                    .transport
                    .request(Method::Get, &path, RequestOptions::new())
                    .await;

                if let Some((document, members)) =
                    self.apply_load(&key, generation, &key.to_string(), result)
                {
                    // Refresh the parent's linkage from the response shape.
                    let linkage = match document.data {
                        Some(PrimaryData::Single(_)) => Linkage::ToOne(members.first().cloned()),
                        _ => Linkage::ToMany(members),
                    };
                    if parent.set_linkage(name, linkage) {
                        self.hub.emit(Scope::Record(parent_key));
                    }
                }
                self.snapshot(&key)
            }
        }
    }

    // ---- Mutations ----

    /// Create a resource. The new record is visible in no collection until
    /// the server acknowledges it; on success it carries the
    /// server-assigned id, enters the identity map, and is appended to the
    /// cached base collection for its kind. On failure nothing was
    /// inserted anywhere and the error is returned.
    pub async fn create(
        &self,
        kind: &str,
        attributes: BTreeMap<String, Value>,
        relationships: BTreeMap<String, Linkage>,
    ) -> StoreResult<Arc<Record>> {
        let record = Record::new_local(kind, attributes, relationships);
        record.set_lifecycle(Lifecycle::Saving);

        let body = Document::single(record.to_raw());
        let document = self
            .transport
            .request(
                Method::Post,
                &endpoint::collection(kind),
                RequestOptions::new().with_body(body),
            )
            .await
            // The unacknowledged instance is simply discarded.
            .map_err(|error| StoreError::classify(error, kind))?;

        let raw = document.single_resource().map_err(StoreError::from)?.clone();
        let id = raw
            .id
            .clone()
            .ok_or_else(|| StoreError::Wire(WireError::MissingId(kind.to_string())))?;
        record.assign_id(id);
        record.merge_raw(&raw);
        self.identity.adopt(record.clone());
        for included in &document.included {
            self.identity.upsert(included)?;
        }

        let key = record.key().expect("id assigned above");
        info!(%key, "record created");
        self.hub.emit(Scope::Record(key.clone()));

        let base = QueryKey::all_base(kind);
        if self.collections.append_member(&base, &key) {
            self.hub.emit(Scope::Collection(base));
        }
        Ok(record)
    }

    /// Update a record's attributes, sending only the changed subset.
    ///
    /// The edit is applied locally first; a failed request restores the
    /// exact pre-call attribute values and `Persisted` state, then returns
    /// the error.
    ///
    /// Panics if `record` is unpersisted or deleted.
    pub async fn update(
        &self,
        record: &Arc<Record>,
        attributes: BTreeMap<String, Value>,
    ) -> StoreResult<Arc<Record>> {
        let key = persisted_key(record, "update");

        let current = record.attributes();
        let changed: BTreeMap<String, Value> = attributes
            .into_iter()
            .filter(|(name, value)| current.get(name) != Some(value))
            .collect();
        if changed.is_empty() {
            return Ok(record.clone());
        }

        let previous = record.apply_attributes(&changed);
        record.set_lifecycle(Lifecycle::Dirty);
        self.hub.emit(Scope::Record(key.clone()));

        let body = Document::single(RawResource {
            kind: key.kind.clone(),
            id: Some(key.id.clone()),
            attributes: changed,
            relationships: BTreeMap::new(),
        });
        let result = self
            .transport
            .request(
                Method::Patch,
                &endpoint::resource(&key.kind, &key.id),
                RequestOptions::new().with_body(body),
            )
            .await;

        match result {
            Ok(document) => {
                match document.single_resource() {
                    // Merge server-computed fields; lifecycle -> Persisted.
                    Ok(raw) => {
                        record.merge_raw(raw);
                    }
                    // Bodyless success (204-style).
                    Err(_) => record.set_lifecycle(Lifecycle::Persisted),
                }
                debug!(%key, "record updated");
                self.hub.emit(Scope::Record(key));
                Ok(record.clone())
            }
            Err(error) => {
                record.restore_attributes(previous);
                record.set_lifecycle(Lifecycle::Persisted);
                self.hub.emit(Scope::Record(key.clone()));
                let error = StoreError::classify(error, &key.to_string());
                warn!(%key, %error, "update failed, local edit reverted");
                Err(error)
            }
        }
    }

    /// Delete a record. On success it leaves the identity map, every
    /// collection, and every other record's linkage; on failure it returns
    /// to `Persisted` and the error is surfaced.
    ///
    /// Panics if `record` is unpersisted.
    pub async fn delete(&self, record: &Arc<Record>) -> StoreResult<()> {
        let key = persisted_key(record, "delete");
        record.set_lifecycle(Lifecycle::Deleting);
        self.hub.emit(Scope::Record(key.clone()));

        let result = self
            .transport
            .request(
                Method::Delete,
                &endpoint::resource(&key.kind, &key.id),
                RequestOptions::new(),
            )
            .await;

        match result {
            Ok(_) => {
                self.identity.remove(&key);
                let touched = self.collections.remove_member(&key);
                for other in self.identity.all() {
                    if other.unlink(&key) {
                        if let Some(other_key) = other.key() {
                            self.hub.emit(Scope::Record(other_key));
                        }
                    }
                }
                record.set_lifecycle(Lifecycle::Deleted);
                info!(%key, "record deleted");
                self.hub.emit(Scope::Record(key));
                for collection_key in touched {
                    self.hub.emit(Scope::Collection(collection_key));
                }
                Ok(())
            }
            Err(error) => {
                record.set_lifecycle(Lifecycle::Persisted);
                self.hub.emit(Scope::Record(key.clone()));
                Err(StoreError::classify(error, &key.to_string()))
            }
        }
    }

    // ---- Cache control ----

    /// Invalidate one collection key: cached members are dropped, the next
    /// read refetches, and any response still in flight for the key is
    /// discarded on arrival.
    pub fn invalidate(&self, key: &QueryKey) {
        self.inflight.forget(&FetchKey::Query(key.clone()));
        if self.collections.invalidate(key) {
            debug!(%key, "collection invalidated");
            self.hub.emit(Scope::Collection(key.clone()));
        }
    }

    /// Explicit teardown: drop every cached record and collection state.
    pub fn clear(&self) {
        self.inflight.reset();
        self.collections.clear();
        self.identity.clear();
    }

    // ---- Observation ----

    /// Subscribe to change events matching `interest`.
    pub fn subscribe(&self, interest: Interest) -> ChangeStream {
        self.hub.subscribe(interest)
    }

    /// A read-only relationship resolver over this store's identity map.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.identity.clone())
    }

    /// The identity-mapped instance for a key, without fetching.
    pub fn cached(&self, key: &ResourceKey) -> Option<Arc<Record>> {
        self.identity.get(key)
    }

    /// Current snapshot of a collection key, without fetching.
    pub fn collection(&self, key: &QueryKey) -> Collection {
        self.snapshot(key)
    }

    // ---- Internals ----

    /// Apply a finished load to its collection state, honoring the
    /// generation token. A stale response -- the key was invalidated or
    /// superseded while the request was in flight -- is discarded
    /// wholesale: no membership write, no identity-map merge. Returns the
    /// document and normalized members on success.
    fn apply_load(
        &self,
        key: &QueryKey,
        generation: u64,
        target: &str,
        result: TransportResult<Document>,
    ) -> Option<(Document, Vec<ResourceKey>)> {
        let current = self
            .collections
            .get(key)
            .is_some_and(|state| state.generation == generation);
        if !current {
            debug!(%key, "stale response discarded");
            return None;
        }

        let outcome = match result {
            Ok(document) => match normalize(&self.identity, &document) {
                Ok(members) => {
                    let applied = self.collections.complete_if_current(key, generation, |state| {
                        state.loading = false;
                        state.loaded = true;
                        state.error = None;
                        state.members = members.clone();
                    });
                    if applied {
                        Some((document, members))
                    } else {
                        None
                    }
                }
                Err(error) => {
                    warn!(%key, %error, "response could not be normalized");
                    self.collections.complete_if_current(key, generation, |state| {
                        state.loading = false;
                        state.error = Some(error);
                    });
                    None
                }
            },
            Err(error) => {
                let error = StoreError::classify(error, target);
                warn!(%key, %error, "collection load failed");
                // Previously loaded members stay visible alongside the error.
                self.collections.complete_if_current(key, generation, |state| {
                    state.loading = false;
                    state.error = Some(error);
                });
                None
            }
        };
        self.hub.emit(Scope::Collection(key.clone()));
        outcome
    }

    fn snapshot(&self, key: &QueryKey) -> Collection {
        let state = self.collections.get(key).unwrap_or_default();
        let records = state
            .members
            .iter()
            .filter_map(|member| self.identity.get(member))
            .collect();
        Collection::new(key.clone(), state.loading, state.error, records)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("identity", &self.identity)
            .field("collections", &self.collections)
            .field("subscribers", &self.hub.subscriber_count())
            .finish()
    }
}

/// The key of a record that must be persisted for `operation`. Contract
/// violations here are programmer errors and fail fast.
fn persisted_key(record: &Record, operation: &str) -> ResourceKey {
    let lifecycle = record.lifecycle();
    assert!(
        !matches!(lifecycle, Lifecycle::Deleted),
        "{operation} on a deleted record"
    );
    record
        .key()
        .unwrap_or_else(|| panic!("{operation} requires a persisted record (found {lifecycle})"))
}
