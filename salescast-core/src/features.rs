use chrono::{Datelike, NaiveDate};

use crate::artifacts::FeatureList;
use crate::forecast::PredictionRequest;

pub const DEFAULT_TEMPERATURE: f64 = 70.0;
pub const DEFAULT_FUEL_PRICE: f64 = 3.5;
pub const DEFAULT_CPI: f64 = 220.0;
pub const DEFAULT_UNEMPLOYMENT: f64 = 7.0;

/// Build the model input for one request.
///
/// Positions: store, dept, year, ISO week, day of year, temperature, fuel
/// price, CPI, unemployment. Absent covariates take the defaults above. The
/// result is zero-padded or truncated to exactly `features.len()` entries.
/// Lag, rolling and EWM features are not derived here.
pub fn build_feature_vector(
    request: &PredictionRequest,
    date: NaiveDate,
    features: &FeatureList,
) -> Vec<f64> {
    let mut vector = vec![
        request.store_id as f64,
        request.dept_id as f64,
        date.year() as f64,
        date.iso_week().week() as f64,
        date.ordinal() as f64,
        request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        request.fuel_price.unwrap_or(DEFAULT_FUEL_PRICE),
        request.cpi.unwrap_or(DEFAULT_CPI),
        request.unemployment.unwrap_or(DEFAULT_UNEMPLOYMENT),
    ];
    vector.resize(features.len(), 0.0);
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PredictionRequest {
        PredictionRequest::new(5, 2, "2024-07-04")
    }

    fn columns(n: usize) -> FeatureList {
        FeatureList::new((0..n).map(|i| format!("f{i}")).collect())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    #[test]
    fn test_prefix_layout_and_defaults() {
        let v = build_feature_vector(&request(), date(), &columns(9));
        assert_eq!(v, vec![5.0, 2.0, 2024.0, 27.0, 186.0, 70.0, 3.5, 220.0, 7.0]);
    }

    #[test]
    fn test_present_covariates_override_defaults() {
        let mut req = request();
        req.temperature = Some(0.0);
        req.fuel_price = Some(2.8);
        req.cpi = Some(211.1);
        req.unemployment = Some(8.1);
        let v = build_feature_vector(&req, date(), &columns(9));
        assert_eq!(&v[5..], &[0.0, 2.8, 211.1, 8.1]);
    }

    #[test]
    fn test_zero_padding() {
        let v = build_feature_vector(&request(), date(), &columns(14));
        assert_eq!(v.len(), 14);
        assert!(v[9..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_truncation_to_default_feature_list() {
        let v = build_feature_vector(&request(), date(), &FeatureList::default());
        assert_eq!(v, vec![5.0, 2.0, 2024.0, 27.0, 186.0, 70.0, 3.5]);
    }

    #[test]
    fn test_length_matches_for_every_covariate_mix() {
        for n in [0, 1, 7, 9, 40] {
            for mask in 0..16u8 {
                let mut req = request();
                req.temperature = (mask & 1 != 0).then_some(55.0);
                req.fuel_price = (mask & 2 != 0).then_some(3.1);
                req.cpi = (mask & 4 != 0).then_some(190.0);
                req.unemployment = (mask & 8 != 0).then_some(9.0);
                let v = build_feature_vector(&req, date(), &columns(n));
                assert_eq!(v.len(), n);
            }
        }
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2021-01-01 belongs to ISO week 53 of 2020.
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let v = build_feature_vector(&request(), d, &columns(9));
        assert_eq!(v[2], 2021.0);
        assert_eq!(v[3], 53.0);
        assert_eq!(v[4], 1.0);
    }
}
