//! # Glucorisk
//!
//! Glucose risk analysis for a single subject's reading history.
//!
//! This crate provides:
//! - A short-horizon trend estimate from the two most recent readings
//! - A lag-feature ridge regression forecaster with self-healing persistence
//! - A rule cascade turning forecast, trend and current value into a risk report
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and pure functions (readings, features, model, report)
//! - `ports`: Trait definitions for external operations (model artifact storage)
//! - `adapters`: Concrete implementations (filesystem, SQLite)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Thresholds and model parameters

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{AnalysisService, Assessment, ModelSource};
pub use config::{AnalysisConfig, Thresholds};
pub use domain::{RawReading, Reading, RiskLevel, RiskReport};

/// Result type for Glucorisk operations
pub type Result<T> = std::result::Result<T, GlucoriskError>;

/// Main error type for Glucorisk
#[derive(Debug, thiserror::Error)]
pub enum GlucoriskError {
    #[error("{0}")]
    Domain(#[from] domain::DomainError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
