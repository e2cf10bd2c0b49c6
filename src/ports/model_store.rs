//! Model store port: Trait for persisting trained model artifacts.
//!
//! Artifacts are keyed by a caller-chosen `identity` (a file path for the file
//! backend, a row key for SQLite). Keying per subject keeps concurrent
//! multi-subject deployments from overwriting each other's models.

use crate::domain::RidgeModel;

/// Trait for model artifact persistence.
pub trait ModelStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check whether an artifact exists for `identity`.
    ///
    /// # Errors
    /// Returns error if the backend cannot be queried.
    fn exists(&self, identity: &str) -> Result<bool, Self::Error>;

    /// Load and decode the artifact for `identity`.
    ///
    /// # Returns
    /// `None` if no artifact is stored.
    ///
    /// # Errors
    /// Returns error if the artifact cannot be read or is corrupt.
    fn load(&self, identity: &str) -> Result<Option<RidgeModel>, Self::Error>;

    /// Persist `model` under `identity`, replacing any previous artifact.
    ///
    /// Implementations must never leave a partially written artifact visible.
    ///
    /// # Errors
    /// Returns error if the write fails.
    fn save(&self, identity: &str, model: &RidgeModel) -> Result<(), Self::Error>;

    /// Remove the artifact for `identity` (no-op if absent).
    ///
    /// # Errors
    /// Returns error if the backend rejects the delete.
    fn delete(&self, identity: &str) -> Result<(), Self::Error>;
}
