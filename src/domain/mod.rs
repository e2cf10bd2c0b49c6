//! Domain layer: Core analysis types and pure functions.
//!
//! Nothing here touches storage or global state. Every function operates on a
//! normalized reading sequence and returns plain values or `DomainError`.

mod features;
mod model;
mod reading;
mod report;
mod trend;

pub use features::{latest_row, training_rows, LagRow, TrainingRow, DEFAULT_LAG_DEPTH};
pub use model::{ArtifactError, RidgeModel};
pub use reading::{normalize, parse_timestamp, RawReading, Reading};
pub use report::{RiskLevel, RiskReport};
pub use trend::rate_of_change;

use thiserror::Error;

/// Errors raised by domain computations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Insufficient history: {have} readings, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Training set is empty after lag/target trimming")]
    EmptyTrainingSet,

    #[error("Numeric fault: {0}")]
    Numeric(String),
}
