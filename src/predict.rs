//! Seam for the price model. Training and serving live elsewhere; this crate only
//! shapes the features and compares the prediction with the asking price.

use serde::Serialize;
use thiserror::Error;

use crate::record::{FuelType, Transmission, Trim, VehicleRecord};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("listing {listing_url} is missing {field}")]
    MissingFeature {
        listing_url: String,
        field: &'static str,
    },

    #[error("model failed: {0}")]
    Model(String),
}

/// The columns the model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub year: i32,
    pub mileage: f64,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    pub exterior_color: Option<String>,
    pub trim: Option<Trim>,
}

impl FeatureRow {
    /// Year and mileage are required; the categorical columns may be absent.
    pub fn from_record(record: &VehicleRecord) -> Result<Self, PredictError> {
        let missing = |field| PredictError::MissingFeature {
            listing_url: record.listing_url.to_string(),
            field,
        };
        Ok(Self {
            year: record.year.ok_or_else(|| missing("year"))?,
            mileage: record.mileage.ok_or_else(|| missing("mileage"))?,
            fuel_type: record.fuel_type,
            transmission: record.transmission,
            exterior_color: record.exterior_color.clone(),
            trim: record.trim,
        })
    }
}

pub trait PriceModel {
    fn predict(&self, features: &FeatureRow) -> Result<f64, PredictError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appraisal {
    pub listing_url: String,
    pub predicted_price: f64,
    pub actual_price: Option<f64>,
    /// Predicted minus asking; a missing asking price counts as zero.
    pub difference: f64,
}

pub fn appraise<M: PriceModel + ?Sized>(
    model: &M,
    record: &VehicleRecord,
) -> Result<Appraisal, PredictError> {
    let features = FeatureRow::from_record(record)?;
    let predicted = model.predict(&features)?;
    let actual = record.price;
    Ok(Appraisal {
        listing_url: record.listing_url.to_string(),
        predicted_price: round2(predicted),
        actual_price: actual.map(round2),
        difference: round2(predicted - actual.unwrap_or(0.0)),
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ListingId;

    /// Straight-line depreciation, enough to check the plumbing.
    struct Linear;

    impl PriceModel for Linear {
        fn predict(&self, f: &FeatureRow) -> Result<f64, PredictError> {
            if f.year < 2000 {
                return Err(PredictError::Model("year out of range".to_string()));
            }
            Ok(60_000.0 - 2_000.0 * (2024 - f.year) as f64 - 0.1 * f.mileage + 0.004)
        }
    }

    fn record() -> VehicleRecord {
        let mut r = VehicleRecord::bare(
            ListingId::parse("https://dealer.test/v?vehicleId=1").unwrap(),
            "https://dealer.test",
        );
        r.year = Some(2021);
        r.mileage = Some(38_500.0);
        r.price = Some(45_900.0);
        r.trim = Some(Trim::Progressiv);
        r
    }

    #[test]
    fn appraisal_is_rounded() {
        let a = appraise(&Linear, &record()).unwrap();
        assert_eq!(a.predicted_price, 50_150.0);
        assert_eq!(a.actual_price, Some(45_900.0));
        assert_eq!(a.difference, 4_250.0);
    }

    #[test]
    fn missing_price_counts_as_zero() {
        let mut r = record();
        r.price = None;
        let a = appraise(&Linear, &r).unwrap();
        assert_eq!(a.actual_price, None);
        assert_eq!(a.difference, a.predicted_price);
    }

    #[test]
    fn year_and_mileage_are_required() {
        let mut r = record();
        r.mileage = None;
        let err = appraise(&Linear, &r).unwrap_err();
        assert!(matches!(err, PredictError::MissingFeature { field: "mileage", .. }));
    }

    #[test]
    fn model_errors_pass_through() {
        let mut r = record();
        r.year = Some(1995);
        assert!(matches!(appraise(&Linear, &r), Err(PredictError::Model(_))));
    }

    #[test]
    fn features_keep_categoricals() {
        let f = FeatureRow::from_record(&record()).unwrap();
        assert_eq!(f.trim, Some(Trim::Progressiv));
        assert_eq!(f.fuel_type, None);
    }
}
