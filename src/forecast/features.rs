//! Feature engineering for the weekly sales regressor
//!
//! Training rows and forecast steps both go through
//! [`SalesFeatures::from_lookback`], so the lag, trend and calendar inputs are
//! computed by exactly one piece of code.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ForecastError;
use crate::domain::WeeklySales;
use crate::ml::FeatureVector;

/// Weeks of history needed to compute one feature row.
pub const LOOKBACK_WEEKS: usize = 4;

/// Canonical input order of a freshly trained model.
pub const FEATURE_NAMES: [&str; 4] = [
    "sales_last_week",
    "sales_1_month_ago",
    "trend_4w",
    "week_of_year",
];

pub fn is_known_feature(name: &str) -> bool {
    FEATURE_NAMES.contains(&name)
}

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Model inputs for one target week
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SalesFeatures {
    /// Sales of the week right before the target
    pub sales_last_week: f64,
    /// Sales four weeks before the target
    pub sales_1_month_ago: f64,
    /// Mean of the four weeks before the target
    pub trend_4w: f64,
    /// ISO week number of the target week (1-53)
    pub week_of_year: u32,
}

impl SalesFeatures {
    /// Features for `target_week` given the four preceding weekly totals,
    /// oldest first.
    pub fn from_lookback(lookback: &[f64; LOOKBACK_WEEKS], target_week: NaiveDate) -> Self {
        Self {
            sales_last_week: lookback[LOOKBACK_WEEKS - 1],
            sales_1_month_ago: lookback[0],
            trend_4w: lookback.iter().sum::<f64>() / LOOKBACK_WEEKS as f64,
            week_of_year: target_week.iso_week().week(),
        }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        match name {
            "sales_last_week" => Some(self.sales_last_week),
            "sales_1_month_ago" => Some(self.sales_1_month_ago),
            "trend_4w" => Some(self.trend_4w),
            "week_of_year" => Some(self.week_of_year as f64),
            _ => None,
        }
    }

    /// Lay the features out in `order`, resolving every slot by name.
    pub fn to_vector(&self, order: &[String]) -> Result<FeatureVector, ForecastError> {
        let features = order
            .iter()
            .map(|name| {
                self.value(name)
                    .ok_or_else(|| ForecastError::UnknownFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureVector {
            features,
            feature_names: order.to_vec(),
        })
    }
}

/// One supervised training example
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub week: NaiveDate,
    pub features: SalesFeatures,
    pub target: f64,
}

/// Feature rows for every week with at least four weeks of history.
///
/// The first four weeks produce no row.
pub fn build_feature_rows(sales: &WeeklySales) -> Vec<FeatureRow> {
    let points = sales.points();
    let values = sales.values();
    (LOOKBACK_WEEKS..points.len())
        .map(|i| {
            let lookback: [f64; LOOKBACK_WEEKS] =
                [values[i - 4], values[i - 3], values[i - 2], values[i - 1]];
            FeatureRow {
                week: points[i].week,
                features: SalesFeatures::from_lookback(&lookback, points[i].week),
                target: values[i],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_first_four_weeks_are_dropped() {
        let sales =
            WeeklySales::from_values(date("2017-01-09"), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let rows = build_feature_rows(&sales);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].week, date("2017-02-06"));
        assert_eq!(rows[0].target, 5.0);
    }

    #[test]
    fn test_row_definitions() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let sales = WeeklySales::from_values(date("2017-01-09"), &values).unwrap();
        let rows = build_feature_rows(&sales);

        let second = rows[1].features;
        assert_eq!(second.sales_last_week, 50.0);
        assert_eq!(second.sales_1_month_ago, 20.0);
        assert_eq!(second.trend_4w, 35.0);
        assert_eq!(second.week_of_year, 7);
        assert_eq!(rows[1].target, 60.0);
    }

    #[test]
    fn test_short_history_has_no_rows() {
        let sales = WeeklySales::from_values(date("2017-01-09"), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(build_feature_rows(&sales).is_empty());
    }

    #[rstest]
    #[case("2018-01-01", 1)]
    #[case("2018-12-31", 1)] // ISO week 1 of 2019
    #[case("2021-01-04", 1)]
    #[case("2020-12-28", 53)]
    fn test_iso_week_number(#[case] week: &str, #[case] expected: u32) {
        let f = SalesFeatures::from_lookback(&[0.0; 4], date(week));
        assert_eq!(f.week_of_year, expected);
    }

    #[test]
    fn test_to_vector_follows_requested_order() {
        let f = SalesFeatures::from_lookback(&[100.0, 110.0, 105.0, 120.0], date("2018-01-08"));
        let order: Vec<String> = vec!["week_of_year".into(), "sales_last_week".into()];
        let v = f.to_vector(&order).unwrap();
        assert_eq!(v.features, vec![2.0, 120.0]);
        assert_eq!(v.feature_names, order);
    }

    #[test]
    fn test_to_vector_rejects_unknown_feature() {
        let f = SalesFeatures::from_lookback(&[1.0; 4], date("2018-01-08"));
        let err = f.to_vector(&["holiday_flag".to_string()]).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownFeature(name) if name == "holiday_flag"));
    }
}
