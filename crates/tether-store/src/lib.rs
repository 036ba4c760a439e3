//! Reactive JSON:API resource store.
//!
//! Tether mirrors a remote JSON:API backend as a graph of identity-stable
//! in-memory records. A [`Store`] is constructed around an injected
//! [`tether_transport::Transport`] and exposes `find_all`, `find_record`,
//! `create`, `update`, `delete`, and `load_related`; responses are
//! normalized into the identity map, relationships resolve lazily through
//! it, and every mutation emits a scoped change event a rendering layer
//! can subscribe to.
//!
//! # Design Rules
//!
//! 1. One live [`Record`] per `(type, id)`: every reference aliases the
//!    canonical instance, so in-place mutation is visible everywhere.
//! 2. Merges are idempotent and never replace a record handle.
//! 3. Failures are surfaced, never retried or swallowed; collection loads
//!    record them as state, mutations return them.
//! 4. Change events carry scope only -- listeners re-read current state.
//! 5. Relationship resolution never mutates the identity map.
//! 6. Stale responses (a load completing after its key was invalidated)
//!    are discarded wholesale.

pub mod collection;
pub mod error;
pub mod notify;
pub mod record;
pub mod resolve;
pub mod store;

mod identity;
mod inflight;
mod normalize;

// Re-export primary types at crate root for ergonomic imports.
pub use collection::{Collection, QueryKey};
pub use error::{StoreError, StoreResult};
pub use notify::{ChangeEvent, ChangeStream, Interest, Scope};
pub use record::{Lifecycle, Record};
pub use resolve::{RelatedEntry, Resolution, Resolver};
pub use store::{FindOptions, IncludePolicy, Store, StoreConfig};

// Re-export the wire and transport types that appear in the public API.
pub use tether_transport::{Transport, TransportError};
pub use tether_wire::{Document, Linkage, Query, RawResource, ResourceKey};
