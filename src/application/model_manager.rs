//! Model manager: Owns the lifecycle of a persisted forecasting model.
//!
//! This service coordinates:
//! - Loading an existing artifact
//! - Bootstrapping a model when none exists and history is long enough
//! - Retraining when the stored artifact is corrupt or incompatible
//! - Persisting freshly trained models
//!
//! Train+persist for one identity runs under a per-identity lock, so concurrent
//! callers sharing an identity never interleave writes. Distinct identities do
//! not contend. A lock entry lives only while some caller holds or awaits it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapters::StorageError;
use crate::config::AnalysisConfig;
use crate::domain::{training_rows, DomainError, Reading, RidgeModel};
use crate::ports::ModelStore;
use crate::GlucoriskError;

/// How the model for an analysis was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Read from an existing artifact
    Loaded,
    /// No artifact existed; trained from the current history
    Trained,
    /// Artifact was unreadable; retrained from the current history
    Retrained,
    /// No model could be loaded or trained
    Unavailable,
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Trained => write!(f, "trained"),
            Self::Retrained => write!(f, "retrained"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result of `ModelManager::load_or_train`.
#[derive(Debug, Clone)]
pub enum ModelOutcome {
    Loaded(RidgeModel),
    Trained(RidgeModel),
    Retrained(RidgeModel),
    Unavailable { reason: String },
}

impl ModelOutcome {
    /// The usable model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&RidgeModel> {
        match self {
            Self::Loaded(m) | Self::Trained(m) | Self::Retrained(m) => Some(m),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn source(&self) -> ModelSource {
        match self {
            Self::Loaded(_) => ModelSource::Loaded,
            Self::Trained(_) => ModelSource::Trained,
            Self::Retrained(_) => ModelSource::Retrained,
            Self::Unavailable { .. } => ModelSource::Unavailable,
        }
    }
}

/// Service managing model artifacts in a `ModelStore`.
pub struct ModelManager<S>
where
    S: ModelStore,
{
    store: Arc<S>,
    config: AnalysisConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> ModelManager<S>
where
    S: ModelStore,
    S::Error: Into<StorageError>,
{
    /// Create a new model manager.
    pub fn new(store: Arc<S>, config: AnalysisConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn identity_lock(&self, identity: &str) -> Arc<Mutex<()>> {
        // The map and the per-identity guards hold no data, so a poisoned
        // lock is still safe to reuse.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(identity.to_string()).or_default())
    }

    fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` while holding the lock for `identity`, then drop the lock entry
    /// if no other caller shares it.
    fn with_identity_lock<T>(&self, identity: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.identity_lock(identity);
        let result = {
            let _guard = Self::acquire(&lock);
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks
            .get(identity)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(identity);
        }
        result
    }

    /// Fit a model on a normalized history without persisting it.
    ///
    /// # Errors
    /// - `DomainError::InsufficientHistory` below the minimum record count
    /// - `DomainError::EmptyTrainingSet` if no lag row has a target
    /// - `DomainError::Numeric` if the fit fails
    pub fn fit(&self, readings: &[Reading]) -> Result<RidgeModel, DomainError> {
        if readings.len() < self.config.min_records {
            return Err(DomainError::InsufficientHistory {
                have: readings.len(),
                need: self.config.min_records,
            });
        }

        let rows = training_rows(readings, self.config.lag_depth);
        let model = RidgeModel::fit(&rows, self.config.ridge_alpha)?;

        tracing::info!(
            "Fitted ridge model on {} rows (lag_depth={}, alpha={})",
            rows.len(),
            self.config.lag_depth,
            self.config.ridge_alpha
        );
        Ok(model)
    }

    fn persist(&self, identity: &str, model: &RidgeModel) -> Result<(), StorageError> {
        self.store.save(identity, model).map_err(Into::into)
    }

    /// Train on `readings` and persist under `identity`, replacing any
    /// previous artifact.
    ///
    /// # Errors
    /// Returns a domain error if training is not possible, or a storage error
    /// if the artifact could not be written.
    pub fn train(&self, readings: &[Reading], identity: &str) -> Result<RidgeModel, GlucoriskError> {
        self.with_identity_lock(identity, || -> Result<RidgeModel, GlucoriskError> {
            let model = self.fit(readings)?;
            self.persist(identity, &model)?;
            Ok(model)
        })
    }

    /// Load the model for `identity`, training one if needed.
    ///
    /// Never fails: every recoverable problem degrades to a lesser outcome and
    /// is logged.
    pub fn load_or_train(&self, readings: &[Reading], identity: &str) -> ModelOutcome {
        self.with_identity_lock(identity, || self.load_or_train_locked(readings, identity))
    }

    fn load_or_train_locked(&self, readings: &[Reading], identity: &str) -> ModelOutcome {
        match self.store.exists(identity) {
            Ok(true) => match self.store.load(identity) {
                Ok(Some(model)) if model.lag_depth() == self.config.lag_depth => {
                    tracing::debug!("Loaded model artifact {:?}", identity);
                    ModelOutcome::Loaded(model)
                }
                Ok(Some(model)) => {
                    tracing::warn!(
                        "Model artifact {:?} has lag depth {}, expected {}; retraining",
                        identity,
                        model.lag_depth(),
                        self.config.lag_depth
                    );
                    self.bootstrap(readings, identity, ModelOutcome::Retrained)
                }
                Ok(None) => self.bootstrap(readings, identity, ModelOutcome::Trained),
                Err(e) => {
                    let e: StorageError = e.into();
                    tracing::warn!("Failed to load model artifact {:?}: {}; retraining", identity, e);
                    self.bootstrap(readings, identity, ModelOutcome::Retrained)
                }
            },
            Ok(false) => self.bootstrap(readings, identity, ModelOutcome::Trained),
            Err(e) => {
                let e: StorageError = e.into();
                tracing::warn!("Failed to check model artifact {:?}: {}, attempting to load/train", identity, e);
                match self.store.load(identity) {
                    Ok(Some(model)) if model.lag_depth() == self.config.lag_depth => {
                        ModelOutcome::Loaded(model)
                    }
                    Ok(None) => self.bootstrap(readings, identity, ModelOutcome::Trained),
                    _ => self.bootstrap(readings, identity, ModelOutcome::Retrained),
                }
            }
        }
    }

    /// Fit and persist while the identity lock is held by the caller.
    fn bootstrap(
        &self,
        readings: &[Reading],
        identity: &str,
        tag: fn(RidgeModel) -> ModelOutcome,
    ) -> ModelOutcome {
        let model = match self.fit(readings) {
            Ok(model) => model,
            Err(e) => {
                tracing::info!("No model for {:?}: {}", identity, e);
                return ModelOutcome::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        // An unsaved model is still valid for this call.
        if let Err(e) = self.persist(identity, &model) {
            tracing::warn!("Failed to persist model {:?}: {}", identity, e);
        }

        tag(model)
    }
}
