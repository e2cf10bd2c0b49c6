//! Error type shared by the model store adapters.

use crate::domain::ArtifactError;

/// Error type for model store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt model artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Invalid model identity: {0:?}")]
    InvalidIdentity(String),
}
