//! Risk report types.
//!
//! Represents the output of a glucose risk analysis.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Qualitative risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// No readings to analyze
    #[serde(rename = "N/A")]
    NotAvailable,
    /// Stable, within range
    #[serde(rename = "LOW")]
    Low,
    /// Trend or forecast warrants attention
    #[serde(rename = "MEDIUM")]
    Medium,
    /// Critical now or forecast to become critical
    #[serde(rename = "HIGH")]
    High,
    /// Analysis could not be performed
    #[serde(rename = "ERROR")]
    Error,
}

impl RiskLevel {
    /// Whether a caller should relay an alert for this level.
    #[must_use]
    pub fn requires_alert(&self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }

    /// Whether the alert should go out as an emergency.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "N/A"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

fn serialize_iso8601<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_some(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        None => serializer.serialize_none(),
    }
}

/// Result of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub risk_level: RiskLevel,

    /// Human-readable explanation
    pub message: String,

    /// When `predicted_value` is expected to be reached
    #[serde(serialize_with = "serialize_iso8601")]
    pub predicted_time: Option<DateTime<Utc>>,

    /// Forecast glucose value in mg/dL
    pub predicted_value: Option<f64>,
}

impl RiskReport {
    /// Report with no forecast attached.
    #[must_use]
    pub fn new(risk_level: RiskLevel, message: impl Into<String>) -> Self {
        Self {
            risk_level,
            message: message.into(),
            predicted_time: None,
            predicted_value: None,
        }
    }

    /// Attach a forecast.
    #[must_use]
    pub fn with_forecast(mut self, value: f64, at: DateTime<Utc>) -> Self {
        self.predicted_value = Some(value);
        self.predicted_time = Some(at);
        self
    }

    #[must_use]
    pub fn no_data() -> Self {
        Self::new(RiskLevel::NotAvailable, "No records available for analysis.")
    }

    #[must_use]
    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self::new(
            RiskLevel::Error,
            format!("Analysis could not be completed: {detail}."),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_alert_policy() {
        assert!(!RiskLevel::Low.requires_alert());
        assert!(!RiskLevel::NotAvailable.requires_alert());
        assert!(RiskLevel::Medium.requires_alert());
        assert!(!RiskLevel::Medium.is_critical());
        assert!(RiskLevel::High.is_critical());
    }

    #[test]
    fn test_json_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let report = RiskReport::new(RiskLevel::Medium, "watch out").with_forecast(72.5, at);
        let json = serde_json::to_value(&report).expect("Should serialize");

        assert_eq!(json["risk_level"], "MEDIUM");
        assert_eq!(json["message"], "watch out");
        assert_eq!(json["predicted_time"], "2024-05-01T08:30:00+00:00");
        assert_eq!(json["predicted_value"], 72.5);
    }

    #[test]
    fn test_no_data_serializes_nulls() {
        let json = serde_json::to_value(RiskReport::no_data()).expect("Should serialize");
        assert_eq!(json["risk_level"], "N/A");
        assert!(json["predicted_value"].is_null());
        assert!(json["predicted_time"].is_null());
    }

    #[test]
    fn test_report_deserializes_back() {
        let json = r#"{"risk_level":"HIGH","message":"m","predicted_time":"2024-05-01T08:30:00+00:00","predicted_value":60.0}"#;
        let report: RiskReport = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(report.risk_level, RiskLevel::High);
        assert_eq!(report.risk_level.to_string(), "HIGH");
        assert!(report.predicted_time.is_some());
    }
}
