//! Risk classifier: ordered rule cascade over a normalized reading history.
//!
//! Rules are evaluated top-down and the first one that produces a report wins:
//!
//! 1. no readings                         -> N/A
//! 2. model forecast below normal_low     -> HIGH
//!    model forecast above warning_hyper  -> HIGH
//!    model forecast outside the
//!    [warning_hypo, normal_high] band    -> MEDIUM
//! 3. latest value at or below normal_low -> HIGH
//! 4. falling fast near hypoglycemia      -> MEDIUM
//! 5. rising fast in hyperglycemia        -> MEDIUM
//! 6. otherwise                           -> LOW (forecast attached if any)

use chrono::{DateTime, Duration, Utc};

use crate::config::AnalysisConfig;
use crate::domain::{latest_row, rate_of_change, DomainError, Reading, RidgeModel, RiskLevel, RiskReport};

/// A model forecast stamped at the prediction horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Everything a rule may look at.
struct Signals<'a> {
    latest: Reading,
    rate: f64,
    forecast: Option<Forecast>,
    config: &'a AnalysisConfig,
}

type Rule = fn(&Signals<'_>) -> Result<Option<RiskReport>, DomainError>;

/// Rules 2 through 5, in evaluation order.
const CASCADE: &[(&str, Rule)] = &[
    ("forecast_hypo", forecast_hypo),
    ("forecast_hyper", forecast_hyper),
    ("forecast_alert", forecast_alert),
    ("critical_low", critical_low),
    ("falling_fast", falling_fast),
    ("rising_fast", rising_fast),
];

/// `at` shifted by `delta`, or a numeric fault if either overflows.
fn offset(at: DateTime<Utc>, delta: Option<Duration>) -> Result<DateTime<Utc>, DomainError> {
    delta
        .and_then(|d| at.checked_add_signed(d))
        .ok_or_else(|| DomainError::Numeric(format!("timestamp {at} is out of range after offset")))
}

fn forecast_hypo(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    let Some(f) = s.forecast.filter(|f| f.value < s.config.thresholds.normal_low) else {
        return Ok(None);
    };
    Ok(Some(
        RiskReport::new(
            RiskLevel::High,
            format!(
                "Imminent hypoglycemia risk: the model predicts {:.0} mg/dL in {} minutes. Take urgent action!",
                f.value, s.config.prediction_minutes
            ),
        )
        .with_forecast(f.value, f.at),
    ))
}

fn forecast_hyper(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    let Some(f) = s.forecast.filter(|f| f.value > s.config.thresholds.warning_hyper) else {
        return Ok(None);
    };
    Ok(Some(
        RiskReport::new(
            RiskLevel::High,
            format!(
                "Imminent hyperglycemia risk: the model predicts {:.0} mg/dL in {} minutes. Monitor closely and adjust medication if needed.",
                f.value, s.config.prediction_minutes
            ),
        )
        .with_forecast(f.value, f.at),
    ))
}

fn forecast_alert(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    let t = &s.config.thresholds;
    let Some(f) = s
        .forecast
        .filter(|f| f.value > t.normal_high || f.value < t.warning_hypo)
    else {
        return Ok(None);
    };
    Ok(Some(
        RiskReport::new(
            RiskLevel::Medium,
            format!(
                "Predicted alert: the model predicts {:.0} mg/dL in {} minutes. Stay alert and measure again.",
                f.value, s.config.prediction_minutes
            ),
        )
        .with_forecast(f.value, f.at),
    ))
}

fn critical_low(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    if !s.config.thresholds.is_critical_low(s.latest.value) {
        return Ok(None);
    }
    Ok(Some(RiskReport::new(
        RiskLevel::High,
        format!(
            "Critical hypoglycemia: your current level is {:.0} mg/dL. Seek treatment immediately and notify your emergency contact.",
            s.latest.value
        ),
    )))
}

fn falling_fast(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    let t = &s.config.thresholds;
    if !(s.rate < t.hypo_drop_rate && s.latest.value <= t.warning_hypo) {
        return Ok(None);
    }

    // rate < hypo_drop_rate < 0, so the division is well defined.
    let minutes = (s.latest.value - t.normal_low) / s.rate.abs();
    let millis = (minutes * 60_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(DomainError::Numeric(format!(
            "time to {} mg/dL is out of range: {minutes} minutes",
            t.normal_low
        )));
    }
    let at = offset(s.latest.timestamp, Duration::try_milliseconds(millis as i64))?;

    Ok(Some(
        RiskReport::new(
            RiskLevel::Medium,
            format!(
                "Hypoglycemia risk: rapid downward trend ({:.2} mg/dL/min). May reach {:.0} mg/dL in about {} minutes. Take preventive measures.",
                s.rate, t.normal_low, minutes as i64
            ),
        )
        .with_forecast(t.normal_low, at),
    ))
}

fn rising_fast(s: &Signals<'_>) -> Result<Option<RiskReport>, DomainError> {
    let t = &s.config.thresholds;
    if !(s.rate > t.hyper_rise_rate && s.latest.value >= t.warning_hyper) {
        return Ok(None);
    }

    let horizon = s.config.prediction_minutes;
    let projected = s.latest.value + s.rate * horizon as f64;
    if !projected.is_finite() {
        return Err(DomainError::Numeric(format!(
            "projection from rate {} produced {projected}",
            s.rate
        )));
    }
    let at = offset(s.latest.timestamp, Duration::try_minutes(horizon))?;

    Ok(Some(
        RiskReport::new(
            RiskLevel::Medium,
            format!(
                "Hyperglycemia risk: rapid upward trend ({:.2} mg/dL/min). Follow your treatment plan.",
                s.rate
            ),
        )
        .with_forecast(projected, at),
    ))
}

fn stable(s: &Signals<'_>) -> RiskReport {
    let mut message = format!(
        "Your current glucose level ({:.0} mg/dL) is stable.",
        s.latest.value
    );
    match s.forecast {
        Some(f) => {
            message.push_str(&format!(
                " The {}-minute forecast is {:.0} mg/dL. Keep monitoring.",
                s.config.prediction_minutes, f.value
            ));
            RiskReport::new(RiskLevel::Low, message).with_forecast(f.value, f.at)
        }
        None => {
            message.push_str(" Keep monitoring.");
            RiskReport::new(RiskLevel::Low, message)
        }
    }
}

/// Rule-based classifier combining the model forecast with trend signals.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    config: AnalysisConfig,
}

impl RiskClassifier {
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Forecast the next value from the most recent lag window.
    ///
    /// Returns `Ok(None)` without a model or without enough readings to fill
    /// the model's lag window.
    ///
    /// # Errors
    /// Returns `DomainError::Numeric` if the model yields a non-finite value or
    /// the horizon timestamp overflows.
    pub fn forecast(
        &self,
        readings: &[Reading],
        model: Option<&RidgeModel>,
    ) -> Result<Option<Forecast>, DomainError> {
        let (Some(model), Some(latest)) = (model, readings.last()) else {
            return Ok(None);
        };
        let Some(row) = latest_row(readings, model.lag_depth()) else {
            return Ok(None);
        };

        let value = model.predict(&row)?;
        if !value.is_finite() {
            return Err(DomainError::Numeric(format!("model produced {value}")));
        }

        Ok(Some(Forecast {
            value,
            at: offset(
                latest.timestamp,
                Duration::try_minutes(self.config.prediction_minutes),
            )?,
        }))
    }

    /// Classify a normalized (time-ascending) history.
    ///
    /// # Errors
    /// Returns `DomainError::Numeric` for internal numeric faults: a non-finite
    /// projection or a timestamp that cannot be represented.
    pub fn classify(
        &self,
        readings: &[Reading],
        model: Option<&RidgeModel>,
    ) -> Result<RiskReport, DomainError> {
        let Some(latest) = readings.last().copied() else {
            return Ok(RiskReport::no_data());
        };

        let signals = Signals {
            latest,
            rate: rate_of_change(readings),
            forecast: self.forecast(readings, model)?,
            config: &self.config,
        };

        for (name, rule) in CASCADE {
            if let Some(report) = rule(&signals)? {
                tracing::debug!("Rule {} fired: {}", name, report.risk_level);
                return Ok(report);
            }
        }

        tracing::debug!("No rule fired; reporting stable");
        Ok(stable(&signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn series(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::new(*v, t0() + Duration::minutes(5 * i as i64)).unwrap())
            .collect()
    }

    /// Model that always predicts `value`.
    fn constant_model(value: f64) -> RidgeModel {
        RidgeModel::from_parts(vec![0.0, 0.0, 0.0], value, 1.0).expect("valid model")
    }

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(AnalysisConfig::default())
    }

    #[test]
    fn test_empty_history() {
        let report = classifier().classify(&[], None).expect("Should classify");
        assert_eq!(report.risk_level, RiskLevel::NotAvailable);
        assert!(report.predicted_value.is_none());
    }

    #[test]
    fn test_single_low_reading_is_critical() {
        let report = classifier().classify(&series(&[65.0]), None).expect("Should classify");
        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(report.predicted_value.is_none());
        assert!(report.predicted_time.is_none());
    }

    #[test]
    fn test_fast_drop_above_warning_is_low() {
        let report = classifier()
            .classify(&series(&[150.0, 140.0]), None)
            .expect("Should classify");
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.message.contains("140"));
    }

    #[test]
    fn test_fast_drop_at_warning_boundary() {
        let readings = series(&[90.0, 80.0]);
        let report = classifier().classify(&readings, None).expect("Should classify");

        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.predicted_value, Some(70.0));
        // (80 - 70) / 2.0 = 5 minutes after the latest reading
        assert_eq!(
            report.predicted_time,
            Some(readings[1].timestamp + Duration::minutes(5))
        );
        assert!(report.message.contains("5 minutes"));
    }

    #[test]
    fn test_slow_drop_at_warning_is_low() {
        let report = classifier()
            .classify(&series(&[82.0, 80.0]), None)
            .expect("Should classify");
        // rate = -0.4 mg/dL/min is not below -0.5
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_fast_rise_in_hyperglycemia() {
        let readings = series(&[170.0, 190.0]);
        let report = classifier().classify(&readings, None).expect("Should classify");

        assert_eq!(report.risk_level, RiskLevel::Medium);
        // 190 + 4.0 * 30
        assert_eq!(report.predicted_value, Some(310.0));
        assert_eq!(
            report.predicted_time,
            Some(readings[1].timestamp + Duration::minutes(30))
        );
    }

    #[test]
    fn test_forecast_rules() {
        let readings = series(&[109.0, 110.0, 112.0, 111.0]);
        let c = classifier();

        let cases = [
            (60.0, RiskLevel::High),
            (200.0, RiskLevel::High),
            (150.0, RiskLevel::Medium),
            (75.0, RiskLevel::Medium),
            (110.0, RiskLevel::Low),
            (80.0, RiskLevel::Low),
            (140.0, RiskLevel::Low),
        ];
        for (predicted, expected) in cases {
            let model = constant_model(predicted);
            let report = c.classify(&readings, Some(&model)).expect("Should classify");
            assert_eq!(report.risk_level, expected, "prediction {predicted}");
            assert_eq!(report.predicted_value, Some(predicted));
            assert_eq!(
                report.predicted_time,
                Some(readings[3].timestamp + Duration::minutes(30))
            );
        }
    }

    #[test]
    fn test_forecast_hypo_beats_trend_rule() {
        // Trend alone would give MEDIUM (rule 4); the forecast gives HIGH.
        let readings = series(&[110.0, 100.0, 90.0, 80.0]);
        let model = constant_model(65.0);
        let report = classifier()
            .classify(&readings, Some(&model))
            .expect("Should classify");

        assert_eq!(report.risk_level, RiskLevel::High);
        assert_eq!(report.predicted_value, Some(65.0));
    }

    #[test]
    fn test_in_band_forecast_falls_through_to_current_value() {
        // Forecast in band does not mask a critical current reading.
        let readings = series(&[78.0, 75.0, 72.0, 68.0]);
        let model = constant_model(100.0);
        let report = classifier()
            .classify(&readings, Some(&model))
            .expect("Should classify");

        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(report.predicted_value.is_none());
    }

    #[test]
    fn test_stable_report_carries_forecast() {
        let readings = series(&[109.0, 110.0, 111.0, 112.0]);
        let model = constant_model(115.0);
        let report = classifier()
            .classify(&readings, Some(&model))
            .expect("Should classify");

        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.message.contains("115 mg/dL"));
        assert_eq!(report.predicted_value, Some(115.0));
    }

    #[test]
    fn test_model_skipped_without_full_lag_window() {
        let model = constant_model(40.0);
        for values in [&[110.0, 112.0][..], &[110.0, 112.0, 114.0][..]] {
            let report = classifier()
                .classify(&series(values), Some(&model))
                .expect("Should classify");

            assert_eq!(report.risk_level, RiskLevel::Low);
            assert!(report.predicted_value.is_none());
            assert!(report.predicted_time.is_none());
        }
    }

    #[test]
    fn test_forecast_reads_last_training_window() {
        // Only lag_3 is weighted: the forecast echoes the oldest input of the
        // last training row, which is the fourth-newest reading.
        let readings = series(&[150.0, 120.0, 110.0, 100.0, 95.0]);
        let model = RidgeModel::from_parts(vec![0.0, 0.0, 1.0], 0.0, 1.0).expect("valid model");
        let forecast = classifier()
            .forecast(&readings, Some(&model))
            .expect("Should forecast")
            .expect("Should have forecast");

        assert!((forecast.value - 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_injected_thresholds() {
        let mut config = AnalysisConfig::default();
        config.thresholds.normal_low = 80.0;
        config.thresholds.warning_hypo = 90.0;

        let report = RiskClassifier::new(config)
            .classify(&series(&[78.0]), None)
            .expect("Should classify");
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_non_finite_forecast_is_fault() {
        let readings = series(&[1e308, 1e308, 1e308, 1e308]);
        let model = RidgeModel::from_parts(vec![1e10, 0.0, 0.0], 0.0, 1.0).expect("valid model");
        assert!(matches!(
            classifier().classify(&readings, Some(&model)),
            Err(DomainError::Numeric(_))
        ));
    }

    #[test]
    fn test_horizon_overflow_is_fault() {
        let mut config = AnalysisConfig::default();
        config.prediction_minutes = 10_000_000_000_000;
        let c = RiskClassifier::new(config);

        // Rising fast in hyperglycemia projects to the horizon.
        assert!(matches!(
            c.classify(&series(&[170.0, 190.0]), None),
            Err(DomainError::Numeric(_))
        ));

        // The model forecast is stamped at the same horizon.
        let model = constant_model(110.0);
        assert!(matches!(
            c.classify(&series(&[110.0, 111.0, 112.0, 113.0]), Some(&model)),
            Err(DomainError::Numeric(_))
        ));
    }

    #[test]
    fn test_eta_overflow_is_fault() {
        let mut config = AnalysisConfig::default();
        config.thresholds.normal_low = -1e300;
        config.thresholds.hypo_drop_rate = -1e-300;
        let c = RiskClassifier::new(config);

        assert!(matches!(
            c.classify(&series(&[80.0, 79.0]), None),
            Err(DomainError::Numeric(_))
        ));
    }

    #[test]
    fn test_infinite_rate_projection_is_fault() {
        let t = t0();
        let readings = [
            Reading::new(-1e308, t).unwrap(),
            Reading::new(1e308, t + Duration::seconds(1)).unwrap(),
        ];
        assert!(rate_of_change(&readings).is_infinite());

        assert!(matches!(
            classifier().classify(&readings, None),
            Err(DomainError::Numeric(_))
        ));
    }
}
