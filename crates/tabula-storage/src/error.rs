//! Storage error types

use thiserror::Error;

use crate::key::Key;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Local storage is not available: {0}")]
    Unsupported(String),

    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("No Tokio runtime available to open the database")]
    NoRuntime,

    #[error("Requested schema version {requested} is lower than stored version {stored}")]
    VersionMismatch { requested: u32, stored: u32 },

    #[error("Collection not found: {0}")]
    UnknownCollection(String),

    #[error("Key {key} already exists in collection {collection}")]
    KeyExists { collection: String, key: Key },

    #[error("Record has no valid key at path '{key_path}'")]
    MissingKey { key_path: String },

    #[error("Invalid key path: '{0}'")]
    InvalidKeyPath(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}
