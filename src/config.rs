//! Analysis configuration.
//!
//! Thresholds, forecast horizon and model parameters are carried in an explicit
//! struct handed to the classifier at construction. Defaults match the clinical
//! reference values (mg/dL and mg/dL per minute); any field can be overridden
//! from a JSON file or from `GLUCORISK_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_LAG_DEPTH;
use crate::GlucoriskError;

const MODEL_PATH_ENV: &str = "GLUCORISK_MODEL_PATH";
const MIN_RECORDS_ENV: &str = "GLUCORISK_MIN_RECORDS";
const LAG_DEPTH_ENV: &str = "GLUCORISK_LAG_DEPTH";
const RIDGE_ALPHA_ENV: &str = "GLUCORISK_RIDGE_ALPHA";
const HORIZON_ENV: &str = "GLUCORISK_PREDICTION_MINUTES";

/// Longest accepted forecast horizon (one day).
pub const MAX_PREDICTION_MINUTES: i64 = 24 * 60;

/// Glucose thresholds driving the risk cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// At or below: hypoglycemia
    pub normal_low: f64,
    /// Above: out of the normal range
    pub normal_high: f64,
    /// Early-warning level for hypoglycemia
    pub warning_hypo: f64,
    /// Early-warning level for hyperglycemia
    pub warning_hyper: f64,
    /// Falling faster than this (mg/dL/min, negative) is a rapid drop
    pub hypo_drop_rate: f64,
    /// Rising faster than this (mg/dL/min) is a rapid rise
    pub hyper_rise_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            normal_low: 70.0,
            normal_high: 140.0,
            warning_hypo: 80.0,
            warning_hyper: 180.0,
            hypo_drop_rate: -0.5,
            hyper_rise_rate: 0.5,
        }
    }
}

impl Thresholds {
    /// Whether a single reading is critically low on its own.
    #[must_use]
    pub fn is_critical_low(&self, value: f64) -> bool {
        value <= self.normal_low
    }
}

/// Full configuration for an analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: Thresholds,

    /// How far ahead model forecasts are stamped, in minutes
    pub prediction_minutes: i64,

    /// Number of past readings per feature row
    pub lag_depth: usize,

    /// Minimum normalized readings before a model is trained
    pub min_records: usize,

    /// L2 penalty for the ridge fit
    pub ridge_alpha: f64,

    /// Model identity used when the caller does not supply one
    pub default_model_identity: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            prediction_minutes: 30,
            lag_depth: DEFAULT_LAG_DEPTH,
            min_records: 5,
            ridge_alpha: 1.0,
            default_model_identity: "glucose_model.bin".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse {:?}", name, raw);
            None
        }
    }
}

impl AnalysisConfig {
    /// Defaults overlaid with any `GLUCORISK_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `GLUCORISK_*` environment overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(MODEL_PATH_ENV) {
            if !path.trim().is_empty() {
                self.default_model_identity = path.trim().to_string();
            }
        }
        if let Some(v) = env_parse(MIN_RECORDS_ENV) {
            self.min_records = v;
        }
        if let Some(v) = env_parse(LAG_DEPTH_ENV) {
            self.lag_depth = v;
        }
        if let Some(v) = env_parse(RIDGE_ALPHA_ENV) {
            self.ridge_alpha = v;
        }
        if let Some(v) = env_parse(HORIZON_ENV) {
            self.prediction_minutes = v;
        }
        self
    }

    /// Load from a JSON file; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, GlucoriskError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the thresholds and model parameters are coherent.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Config` describing every problem found.
    pub fn validate(&self) -> Result<(), GlucoriskError> {
        let t = &self.thresholds;
        let mut errors = Vec::new();

        let all_finite = [
            t.normal_low,
            t.normal_high,
            t.warning_hypo,
            t.warning_hyper,
            t.hypo_drop_rate,
            t.hyper_rise_rate,
            self.ridge_alpha,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            errors.push("thresholds and ridge_alpha must be finite".to_string());
        }
        if !(t.normal_low < t.warning_hypo && t.warning_hypo < t.normal_high) {
            errors.push(format!(
                "expected normal_low < warning_hypo < normal_high, got {} / {} / {}",
                t.normal_low, t.warning_hypo, t.normal_high
            ));
        }
        if t.normal_high > t.warning_hyper {
            errors.push(format!(
                "normal_high {} exceeds warning_hyper {}",
                t.normal_high, t.warning_hyper
            ));
        }
        if t.hypo_drop_rate >= 0.0 {
            errors.push(format!("hypo_drop_rate {} must be negative", t.hypo_drop_rate));
        }
        if t.hyper_rise_rate <= 0.0 {
            errors.push(format!("hyper_rise_rate {} must be positive", t.hyper_rise_rate));
        }
        if !(1..=MAX_PREDICTION_MINUTES).contains(&self.prediction_minutes) {
            errors.push(format!(
                "prediction_minutes {} must be within 1..={}",
                self.prediction_minutes, MAX_PREDICTION_MINUTES
            ));
        }
        if self.lag_depth == 0 {
            errors.push("lag_depth must be at least 1".to_string());
        }
        if self.min_records <= self.lag_depth {
            errors.push(format!(
                "min_records {} must exceed lag_depth {}",
                self.min_records, self.lag_depth
            ));
        }
        if self.ridge_alpha < 0.0 {
            errors.push(format!("ridge_alpha {} must not be negative", self.ridge_alpha));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GlucoriskError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_records, 5);
        assert_eq!(config.lag_depth, 3);
        assert_eq!(config.prediction_minutes, 30);
    }

    #[test]
    fn test_critical_low_is_inclusive() {
        let t = Thresholds::default();
        assert!(t.is_critical_low(70.0));
        assert!(t.is_critical_low(55.0));
        assert!(!t.is_critical_low(70.1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"thresholds": {"warning_hypo": 85.0}, "min_records": 8}"#;
        let config: AnalysisConfig = serde_json::from_str(json).expect("Should parse");
        assert!((config.thresholds.warning_hypo - 85.0).abs() < f64::EPSILON);
        assert!((config.thresholds.normal_low - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.min_records, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_inverted_thresholds() {
        let mut config = AnalysisConfig::default();
        config.thresholds.warning_hypo = 60.0;
        config.min_records = 2;

        let err = config.validate().expect_err("Should fail");
        let msg = err.to_string();
        assert!(msg.contains("warning_hypo"));
        assert!(msg.contains("min_records"));
    }

    #[test]
    fn test_validation_bounds_horizon() {
        let mut config = AnalysisConfig::default();

        config.prediction_minutes = MAX_PREDICTION_MINUTES;
        assert!(config.validate().is_ok());

        for minutes in [0, MAX_PREDICTION_MINUTES + 1, 10_000_000_000_000] {
            config.prediction_minutes = minutes;
            let err = config.validate().expect_err("Should fail");
            assert!(err.to_string().contains("prediction_minutes"));
        }
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ridge_alpha": 0.5}"#).expect("write config");

        let config = AnalysisConfig::from_json_file(&path).expect("Should load");
        assert!((config.ridge_alpha - 0.5).abs() < f64::EPSILON);
    }
}
