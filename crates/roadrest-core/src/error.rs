//! Core error types for roadrest-core.
//!
//! Failures are recoverable at the manager boundary: persistence and
//! routing errors surface on the owning manager's published error state
//! and abort only the operation that raised them. Prediction failures
//! degrade to deterministic defaults inside the managers and never reach
//! callers.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for roadrest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No route geometry could be computed for the requested trip.
    #[error("routing failed: {0}")]
    Routing(String),

    /// The persistence collaborator was unreachable or rejected a write.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The prediction model was unavailable or returned garbage.
    #[error("prediction unavailable: {0}")]
    Prediction(String),

    /// An operation required an authenticated user and none was present,
    /// or the identity provider rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A state-machine operation was invoked from a disallowed state.
    #[error("invalid transition: cannot {op} while {state}")]
    InvalidTransition { op: &'static str, state: String },

    /// Point-of-interest lookup failed.
    #[error("place search failed: {0}")]
    PlaceSearch(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Storage-layer errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record does not exist in the store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Failed to open the backing database.
    #[error("failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A query failed against the backing database.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored value could not be decoded.
    #[error("stored value corrupt: {0}")]
    Corrupt(String),

    /// The store is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse config file
    #[error("failed to parse config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write config file
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    /// The data directory could not be created.
    #[error("data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}
