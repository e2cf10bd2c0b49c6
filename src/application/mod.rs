//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the analysis and training use cases.

mod analysis;
mod classifier;
mod model_manager;

pub use analysis::{AnalysisService, Assessment};
pub use classifier::{Forecast, RiskClassifier};
pub use model_manager::{ModelManager, ModelOutcome, ModelSource};
