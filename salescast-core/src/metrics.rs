//! Forecast evaluation metrics.

use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;
use crate::error::ForecastError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub actual: f64,
    pub predicted: f64,
    #[serde(default)]
    pub is_holiday: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluationReport {
    pub count: usize,
    pub wmae: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Percent. `None` when every actual is zero.
    pub mape: Option<f64>,
}

/// Weighted mean absolute error; holiday weeks use `holiday_weight`.
pub fn wmae(observations: &[Observation], holiday_weight: f64, regular_weight: f64) -> f64 {
    let (num, den) = observations.iter().fold((0.0, 0.0), |(num, den), o| {
        let w = if o.is_holiday { holiday_weight } else { regular_weight };
        (num + w * (o.actual - o.predicted).abs(), den + w)
    });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

pub fn mae(observations: &[Observation]) -> f64 {
    wmae(observations, 1.0, 1.0)
}

pub fn rmse(observations: &[Observation]) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let mse = observations
        .iter()
        .map(|o| (o.actual - o.predicted).powi(2))
        .sum::<f64>()
        / observations.len() as f64;
    mse.sqrt()
}

/// Mean absolute percentage error over observations with a non-zero actual.
pub fn mape(observations: &[Observation]) -> Option<f64> {
    let errors: Vec<f64> = observations
        .iter()
        .filter(|o| o.actual != 0.0)
        .map(|o| ((o.actual - o.predicted) / o.actual).abs())
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some(errors.iter().sum::<f64>() / errors.len() as f64 * 100.0)
}

pub fn evaluate(
    observations: &[Observation],
    config: &MetricsConfig,
) -> Result<EvaluationReport, ForecastError> {
    if observations.is_empty() {
        return Err(ForecastError::Other("no observations to evaluate".to_string()));
    }
    Ok(EvaluationReport {
        count: observations.len(),
        wmae: wmae(observations, config.holiday_weight, config.regular_weight),
        mae: mae(observations),
        rmse: rmse(observations),
        mape: mape(observations),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(actual: f64, predicted: f64, is_holiday: bool) -> Observation {
        Observation {
            actual,
            predicted,
            is_holiday,
        }
    }

    #[test]
    fn test_wmae_weights_holidays() {
        let data = [obs(100.0, 90.0, false), obs(200.0, 180.0, true)];
        // (1*10 + 5*20) / 6
        let expected = 110.0 / 6.0;
        assert!((wmae(&data, 5.0, 1.0) - expected).abs() < 1e-12);
        assert_eq!(mae(&data), 15.0);
    }

    #[test]
    fn test_rmse_and_mape() {
        let data = [obs(100.0, 103.0, false), obs(50.0, 46.0, false)];
        assert!((rmse(&data) - 12.5f64.sqrt()).abs() < 1e-12);
        // (3% + 8%) / 2
        assert!((mape(&data).unwrap() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let data = [obs(0.0, 10.0, false), obs(10.0, 12.0, false)];
        assert!((mape(&data).unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(mape(&[obs(0.0, 1.0, true)]), None);
    }

    #[test]
    fn test_evaluate_uses_configured_weights() {
        let data = [obs(10.0, 0.0, true), obs(10.0, 10.0, false)];
        let report = evaluate(&data, &MetricsConfig::default()).unwrap();
        assert_eq!(report.count, 2);
        // (5*10 + 1*0) / 6
        assert!((report.wmae - 50.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.mae, 5.0);
    }

    #[test]
    fn test_evaluate_rejects_empty_input() {
        assert!(evaluate(&[], &MetricsConfig::default()).is_err());
    }
}
