use thiserror::Error;

use tether_wire::Document;

/// Errors a transport can fail with.
///
/// `Network` means no HTTP response was obtained (unreachable host,
/// timeout, connection reset). `Http` means the server answered with a
/// non-2xx status; the decoded body travels with it so callers can read
/// structured JSON:API error objects.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status}")]
    Http { status: u16, document: Document },
}

impl TransportError {
    pub fn http(status: u16, document: Document) -> Self {
        Self::Http { status, document }
    }

    /// The HTTP status, if a response was obtained.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(_) => None,
            Self::Http { status, .. } => Some(*status),
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
