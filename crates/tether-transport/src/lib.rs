//! Transport seam for Tether.
//!
//! The store never speaks HTTP itself -- it consumes the [`Transport`]
//! capability defined here. A production binding (reqwest, hyper, a mobile
//! shell's native stack) supplies base URL, auth headers, and TLS; this
//! crate supplies the contract it must satisfy and an [`InMemoryBackend`]
//! that satisfies it without a network, for tests and embedding.
//!
//! # Contract
//!
//! `request(method, path, options)` resolves to a decoded JSON:API
//! [`Document`] on any 2xx response. Everything else is a
//! [`TransportError`]: `Network` when no response was obtained, `Http`
//! carrying the status and the (possibly empty) error document otherwise.
//! The transport performs no retries and interprets no documents.

pub mod endpoint;
pub mod error;
pub mod memory;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use memory::InMemoryBackend;
pub use transport::{Method, RequestOptions, Transport};

// Re-export the wire document the contract is expressed in.
pub use tether_wire::Document;
