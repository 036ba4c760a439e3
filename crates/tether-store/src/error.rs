use thiserror::Error;

use tether_transport::TransportError;
use tether_wire::{ErrorObject, WireError};

/// Errors surfaced by store operations.
///
/// The store classifies transport failures into this taxonomy and never
/// recovers or retries locally; retry policy belongs to the caller.
/// Contract violations (e.g. updating an unpersisted record) are
/// programmer errors and panic instead of appearing here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The transport obtained no response (unreachable, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the request with structured error objects.
    #[error("validation rejected with {} error(s)", errors.len())]
    Validation { errors: Vec<ErrorObject> },

    /// 404 for the requested target.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// 401 or 403.
    #[error("authentication rejected (status {status})")]
    Auth { status: u16 },

    /// 5xx.
    #[error("server error (status {status})")]
    Server { status: u16 },

    /// The response document could not be interpreted.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

impl StoreError {
    /// Classify a transport failure. `target` names what was requested
    /// (a path like `restaurants/1`), used for 404 reporting.
    pub(crate) fn classify(error: TransportError, target: &str) -> Self {
        match error {
            TransportError::Network(message) => Self::Network(message),
            TransportError::Http { status, document } => match status {
                404 => Self::NotFound {
                    target: target.to_string(),
                },
                401 | 403 => Self::Auth { status },
                400..=499 => Self::Validation {
                    errors: document.errors,
                },
                _ => Self::Server { status },
            },
        }
    }

    /// Per-field validation detail: `(field, message)` pairs recovered from
    /// each error's `source.pointer`. Empty for non-validation errors and
    /// for errors without an attribute pointer.
    pub fn field_errors(&self) -> Vec<(String, String)> {
        let Self::Validation { errors } = self else {
            return Vec::new();
        };
        errors
            .iter()
            .filter_map(|error| {
                let field = error.attribute_field()?;
                let message = error
                    .detail
                    .clone()
                    .or_else(|| error.title.clone())
                    .unwrap_or_default();
                Some((field.to_string(), message))
            })
            .collect()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
