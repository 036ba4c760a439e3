use thiserror::Error;

/// Errors produced while encoding or decoding wire documents.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("document carries both data and errors")]
    DataAndErrors,

    #[error("resource object of type \"{0}\" is missing an id")]
    MissingId(String),

    #[error("document carries no primary data")]
    NoPrimaryData,
}

pub type WireResult<T> = Result<T, WireError>;
