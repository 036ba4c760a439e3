//! In-memory JSON:API backend for testing and embedding.
//!
//! [`InMemoryBackend`] implements the full [`Transport`] contract over a
//! `BTreeMap` protected by locks: collection and single-resource endpoints,
//! the related-resource endpoint, compound documents via `include`,
//! server-assigned ids, and 404/409/422 error documents. Suitable for unit
//! tests, examples, and short-lived processes that want store semantics
//! without a server.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use tether_wire::{Document, ErrorObject, PrimaryData, Query, RawResource, ResourceKey};

use crate::error::{TransportError, TransportResult};
use crate::transport::{Method, RequestOptions, Transport};

/// An in-memory implementation of [`Transport`].
///
/// Resources live in a `BTreeMap` keyed by `(type, id)`, so collection
/// responses are deterministically ordered. Data is lost when the backend
/// is dropped.
pub struct InMemoryBackend {
    resources: RwLock<BTreeMap<ResourceKey, RawResource>>,
    required: RwLock<Vec<(String, String)>>,
    faults: Mutex<VecDeque<TransportError>>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            required: RwLock::new(Vec::new()),
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// Preload a resource. The resource must carry an id.
    pub fn seed(&self, resource: RawResource) {
        let key = resource.key().expect("seeded resource requires an id");
        self.resources
            .write()
            .expect("lock poisoned")
            .insert(key, resource);
    }

    /// Declare an attribute required for a kind. A `POST` missing it, or a
    /// `POST`/`PATCH` setting it to `null`, is rejected with a 422 document
    /// whose `source.pointer` names the field.
    pub fn require_attribute(&self, kind: impl Into<String>, name: impl Into<String>) {
        self.required
            .write()
            .expect("lock poisoned")
            .push((kind.into(), name.into()));
    }

    /// Queue a failure to be returned by the next request instead of a
    /// response. Queued failures are consumed in FIFO order.
    pub fn inject_failure(&self, error: TransportError) {
        self.faults.lock().expect("lock poisoned").push_back(error);
    }

    /// Number of resources currently stored.
    pub fn len(&self) -> usize {
        self.resources.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.read().expect("lock poisoned").is_empty()
    }

    /// Current stored state of a resource, for test assertions.
    pub fn get(&self, key: &ResourceKey) -> Option<RawResource> {
        self.resources.read().expect("lock poisoned").get(key).cloned()
    }

    /// Remove all resources.
    pub fn clear(&self) {
        self.resources.write().expect("lock poisoned").clear();
    }

    fn not_found(detail: String) -> TransportError {
        let doc = Document::from_errors(vec![ErrorObject::new(404, "Not Found").with_detail(detail)]);
        TransportError::http(404, doc)
    }

    fn conflict(detail: String) -> TransportError {
        let doc = Document::from_errors(vec![ErrorObject::new(409, "Conflict").with_detail(detail)]);
        TransportError::http(409, doc)
    }

    /// Required-attribute check. `creating` controls whether an absent
    /// attribute counts as a violation (it does on `POST`, not on `PATCH`).
    fn validate(&self, kind: &str, resource: &RawResource, creating: bool) -> TransportResult<()> {
        let required = self.required.read().expect("lock poisoned");
        let mut errors = Vec::new();
        for (req_kind, name) in required.iter() {
            if req_kind != kind {
                continue;
            }
            let violated = match resource.attributes.get(name) {
                None => creating,
                Some(value) => value.is_null(),
            };
            if violated {
                errors.push(
                    ErrorObject::new(422, "Unprocessable Entity")
                        .with_detail(format!("{name} can't be blank"))
                        .with_pointer(format!("/data/attributes/{name}")),
                );
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TransportError::http(422, Document::from_errors(errors)))
        }
    }

    /// Side-loaded resources for the `include` paths: for each primary
    /// resource, follow the first segment of each path and collect the
    /// targets, deduplicated and excluding the primaries themselves.
    fn sideload(&self, primary: &[RawResource], query: &Query) -> Vec<RawResource> {
        if query.include.is_empty() {
            return Vec::new();
        }
        let resources = self.resources.read().expect("lock poisoned");
        let primary_keys: Vec<ResourceKey> = primary.iter().filter_map(RawResource::key).collect();
        let mut seen = Vec::new();
        let mut included = Vec::new();
        for resource in primary {
            for path in &query.include {
                let name = path.split('.').next().unwrap_or(path);
                let Some(linkage) = resource.linkage(name) else {
                    continue;
                };
                for key in linkage.keys() {
                    if primary_keys.contains(&key) || seen.contains(&key) {
                        continue;
                    }
                    if let Some(target) = resources.get(&key) {
                        seen.push(key);
                        included.push(target.clone());
                    }
                }
            }
        }
        included
    }

    fn list(&self, kind: &str, query: &Query) -> TransportResult<Document> {
        let matching: Vec<RawResource> = {
            let resources = self.resources.read().expect("lock poisoned");
            resources
                .values()
                .filter(|r| r.kind == kind)
                .cloned()
                .collect()
        };
        let included = self.sideload(&matching, query);
        let mut doc = Document::collection(matching);
        doc.included = included;
        Ok(doc)
    }

    fn fetch(&self, kind: &str, id: &str, query: &Query) -> TransportResult<Document> {
        let key = ResourceKey::new(kind, id);
        let resource = self
            .get(&key)
            .ok_or_else(|| Self::not_found(format!("no resource {key}")))?;
        let included = self.sideload(std::slice::from_ref(&resource), query);
        let mut doc = Document::single(resource);
        doc.included = included;
        Ok(doc)
    }

    fn create(&self, kind: &str, options: &RequestOptions) -> TransportResult<Document> {
        let body = options
            .body
            .as_ref()
            .ok_or_else(|| Self::conflict("POST requires a document body".into()))?;
        let submitted = body
            .single_resource()
            .map_err(|e| Self::conflict(e.to_string()))?;
        if submitted.kind != kind {
            return Err(Self::conflict(format!(
                "type \"{}\" does not match endpoint \"{kind}\"",
                submitted.kind
            )));
        }
        self.validate(kind, submitted, true)?;

        let mut resource = submitted.clone();
        if resource.id.is_none() {
            resource.id = Some(Uuid::now_v7().to_string());
        }
        let key = resource.key().expect("id just assigned");
        self.resources
            .write()
            .expect("lock poisoned")
            .insert(key.clone(), resource.clone());
        debug!(%key, "resource created");
        Ok(Document::single(resource))
    }

    fn update(&self, kind: &str, id: &str, options: &RequestOptions) -> TransportResult<Document> {
        let key = ResourceKey::new(kind, id);
        let body = options
            .body
            .as_ref()
            .ok_or_else(|| Self::conflict("PATCH requires a document body".into()))?;
        let submitted = body
            .single_resource()
            .map_err(|e| Self::conflict(e.to_string()))?;
        if submitted.kind != kind {
            return Err(Self::conflict(format!(
                "type \"{}\" does not match endpoint \"{kind}\"",
                submitted.kind
            )));
        }
        self.validate(kind, submitted, false)?;

        let mut resources = self.resources.write().expect("lock poisoned");
        let existing = resources
            .get_mut(&key)
            .ok_or_else(|| Self::not_found(format!("no resource {key}")))?;
        for (name, value) in &submitted.attributes {
            existing.attributes.insert(name.clone(), value.clone());
        }
        for (name, rel) in &submitted.relationships {
            existing.relationships.insert(name.clone(), rel.clone());
        }
        debug!(%key, "resource updated");
        Ok(Document::single(existing.clone()))
    }

    fn delete(&self, kind: &str, id: &str) -> TransportResult<Document> {
        let key = ResourceKey::new(kind, id);
        let mut resources = self.resources.write().expect("lock poisoned");
        if resources.remove(&key).is_none() {
            return Err(Self::not_found(format!("no resource {key}")));
        }
        // Server-side referential cleanup: drop dangling linkage.
        for resource in resources.values_mut() {
            for rel in resource.relationships.values_mut() {
                rel.data.remove(&key);
            }
        }
        debug!(%key, "resource deleted");
        Ok(Document::empty())
    }

    fn related(&self, kind: &str, id: &str, name: &str, query: &Query) -> TransportResult<Document> {
        let key = ResourceKey::new(kind, id);
        let parent = self
            .get(&key)
            .ok_or_else(|| Self::not_found(format!("no resource {key}")))?;
        let linkage = parent
            .linkage(name)
            .ok_or_else(|| Self::not_found(format!("no relationship \"{name}\" on {key}")))?
            .clone();

        let resources = self.resources.read().expect("lock poisoned");
        match linkage {
            tether_wire::Linkage::ToOne(target) => {
                let found = target.and_then(|k| resources.get(&k).cloned());
                drop(resources);
                let doc = match found {
                    Some(resource) => {
                        let included = self.sideload(std::slice::from_ref(&resource), query);
                        let mut doc = Document::single(resource);
                        doc.included = included;
                        doc
                    }
                    None => Document {
                        data: Some(PrimaryData::Single(None)),
                        ..Document::default()
                    },
                };
                Ok(doc)
            }
            tether_wire::Linkage::ToMany(keys) => {
                let matching: Vec<RawResource> = keys
                    .iter()
                    .filter_map(|k| resources.get(k).cloned())
                    .collect();
                drop(resources);
                let included = self.sideload(&matching, query);
                let mut doc = Document::collection(matching);
                doc.included = included;
                Ok(doc)
            }
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("resource_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl Transport for InMemoryBackend {
    async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> TransportResult<Document> {
        if let Some(fault) = self.faults.lock().expect("lock poisoned").pop_front() {
            debug!(%method, path, "injected fault");
            return Err(fault);
        }
        debug!(%method, path, query = %options.query, "in-memory request");

        let trimmed = path.trim_start_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match (method, segments.as_slice()) {
            (Method::Get, [kind]) => self.list(kind, &options.query),
            (Method::Post, [kind]) => self.create(kind, &options),
            (Method::Get, [kind, id]) => self.fetch(kind, id, &options.query),
            (Method::Patch, [kind, id]) => self.update(kind, id, &options),
            (Method::Delete, [kind, id]) => self.delete(kind, id),
            (Method::Get, [kind, id, name]) => self.related(kind, id, name, &options.query),
            _ => Err(Self::not_found(format!("no route for {method} {path}"))),
        }
    }
}
