//! Error types for the resolution pipeline.
//!
//! Each concern gets its own enum so callers can match on exactly the failures
//! they care about; `PipelineError` is the union surfaced to the panel.

use thiserror::Error;

/// No usable reference in the view, the cache, or the re-fetched thread.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("no mapping reference found for this conversation")]
    ReferenceNotFound,
    #[error("conversation fetch failed: {0}")]
    Fetch(String),
}

/// Failures while turning a reference into a [`crate::types::Mapping`].
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("key must decode to exactly 32 bytes")]
    InvalidKey,
    #[error("encrypted payload shorter than the 12-byte nonce")]
    InvalidBlob,
    #[error("authenticated decryption failed")]
    DecryptFailure,
    #[error("payload is not valid gzip: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("expected mapping JSON but received a markup document")]
    UnexpectedContentType,
    #[error("malformed mapping JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("indirect channel error: {0}")]
    Indirect(String),
    #[error("invalid reference URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for RetrieveError {
    fn from(err: reqwest::Error) -> Self {
        RetrieveError::Transport(err.to_string())
    }
}

/// Failures of the SQLite-backed reference store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reference store: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("reference store lock poisoned")]
    Poisoned,
}

/// Everything `MappingPipeline::load` can surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
}
