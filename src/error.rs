use thiserror::Error;

/// Failure converting a value to or from its byte representation.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Failure reported by a [`PersistenceStore`](crate::store::PersistenceStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested key is not persisted.
    #[error("key not found: {0}")]
    NotFound(String),

    /// A persisted record exists but could not be decoded.
    #[error("corrupt record for key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for store implementations outside this crate.
    #[error("store error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum PersistentMapError {
    /// A mutator was called with an argument the map does not accept. Raised before any
    /// state change.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Hydration could not read a persisted key.
    #[error("failed to read key {key} while hydrating")]
    HydrationRead {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The store holds a key the map would refuse from a caller.
    #[error("store holds invalid key {key:?}")]
    HydrationKey { key: String },

    /// Hydration read a persisted key but could not decode it.
    #[error("failed to decode key {key} while hydrating")]
    HydrationDecode {
        key: String,
        #[source]
        source: CodecError,
    },
}

pub type Result<T> = std::result::Result<T, PersistentMapError>;
