//! Analysis service: the entry points exposed to callers.
//!
//! `analyze` runs the full pipeline (normalize, load or train a model,
//! classify) and always returns a well-formed `RiskReport`. Malformed input and
//! internal faults become `ERROR` reports; missing data becomes `N/A`.

use std::sync::Arc;

use crate::adapters::StorageError;
use crate::config::AnalysisConfig;
use crate::domain::{normalize, RawReading, RiskReport};
use crate::ports::ModelStore;
use crate::GlucoriskError;

use super::classifier::RiskClassifier;
use super::model_manager::{ModelManager, ModelSource};

/// A report together with how its model was obtained.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub report: RiskReport,
    /// `None` when the pipeline stopped before the model stage
    pub model_source: Option<ModelSource>,
}

/// Service for glucose risk analysis.
pub struct AnalysisService<S>
where
    S: ModelStore,
{
    models: ModelManager<S>,
    classifier: RiskClassifier,
}

impl<S> AnalysisService<S>
where
    S: ModelStore,
    S::Error: Into<StorageError>,
{
    /// Create a new analysis service.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Config` if the configuration is inconsistent.
    pub fn new(store: Arc<S>, config: AnalysisConfig) -> Result<Self, GlucoriskError> {
        config.validate()?;
        Ok(Self {
            models: ModelManager::new(store, config.clone()),
            classifier: RiskClassifier::new(config),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        self.classifier.config()
    }

    #[must_use]
    pub fn model_manager(&self) -> &ModelManager<S> {
        &self.models
    }

    /// Assess a reading history, reporting which model path was taken.
    pub fn assess(&self, history: &[RawReading], model_identity: &str) -> Assessment {
        if history.is_empty() {
            return Assessment {
                report: RiskReport::no_data(),
                model_source: None,
            };
        }

        let readings = match normalize(history) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Rejected reading history: {}", e);
                return Assessment {
                    report: RiskReport::error(e),
                    model_source: None,
                };
            }
        };

        let outcome = self.models.load_or_train(&readings, model_identity);
        let source = outcome.source();

        let report = self
            .classifier
            .classify(&readings, outcome.model())
            .unwrap_or_else(|e| {
                tracing::error!("Classification fault: {}", e);
                RiskReport::error(e)
            });

        tracing::info!(
            "Analysis complete: readings={}, model={}, risk={}",
            readings.len(),
            source,
            report.risk_level
        );

        Assessment {
            report,
            model_source: Some(source),
        }
    }

    /// Analyze a reading history and return the risk report.
    pub fn analyze(&self, history: &[RawReading], model_identity: &str) -> RiskReport {
        self.assess(history, model_identity).report
    }

    /// Train and persist a model for `model_identity` from `history`.
    ///
    /// Returns `true` only when a model was fitted and written.
    pub fn train(&self, history: &[RawReading], model_identity: &str) -> bool {
        match self.try_train(history, model_identity) {
            Ok(model) => {
                tracing::info!(
                    "Trained model {:?} on {} samples",
                    model_identity,
                    model.samples()
                );
                true
            }
            Err(e) => {
                tracing::warn!("Training {:?} failed: {}", model_identity, e);
                false
            }
        }
    }

    /// Like `train`, but with the failure reason.
    ///
    /// # Errors
    /// Returns error for malformed input, insufficient history, fit failure or
    /// a failed write.
    pub fn try_train(
        &self,
        history: &[RawReading],
        model_identity: &str,
    ) -> Result<crate::domain::RidgeModel, GlucoriskError> {
        let readings = normalize(history)?;
        self.models.train(&readings, model_identity)
    }
}
