//! JSON:API wire model for Tether.
//!
//! This crate implements the `application/vnd.api+json` document shapes that
//! every Tether component speaks: resource objects, relationship linkage,
//! top-level documents, error objects, and query parameter encoding.
//!
//! # Document Shapes
//!
//! - [`ResourceKey`] -- the `(type, id)` identity of a persisted resource
//! - [`RawResource`] -- a resource object as it appears on the wire
//! - [`Linkage`] -- to-one or to-many relationship linkage data
//! - [`Document`] -- a top-level document: primary data, `included`, `errors`
//! - [`ErrorObject`] -- a JSON:API error with its `source.pointer` intact
//! - [`Query`] -- `include` paths plus opaque passthrough parameters
//!
//! # Design Rules
//!
//! 1. Wire types are plain data: no identity, no caching, no I/O.
//! 2. A document carries primary data or errors, never both.
//! 3. `source.pointer` survives decode intact -- field-level validation
//!    mapping depends on it downstream.
//! 4. Parameters other than `include` are never interpreted, only encoded.

pub mod document;
pub mod error;
pub mod identifier;
pub mod query;
pub mod resource;

// Re-export primary types at crate root for ergonomic imports.
pub use document::{Document, ErrorObject, ErrorSource, PrimaryData, MEDIA_TYPE};
pub use error::{WireError, WireResult};
pub use identifier::ResourceKey;
pub use query::Query;
pub use resource::{Linkage, RawResource, RelationshipObject};
