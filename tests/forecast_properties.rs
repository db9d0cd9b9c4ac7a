mod common;

use std::sync::OnceLock;

use chrono::Duration;
use proptest::prelude::*;
use sales_forecaster::{
    domain::WeeklySales,
    forecast::{build_feature_rows, feature_names, ForecastSeed, RecursiveForecaster},
    ml::{MLModel, TrainedModel},
};

fn model() -> &'static TrainedModel {
    static MODEL: OnceLock<TrainedModel> = OnceLock::new();
    MODEL.get_or_init(|| common::trained_model(&common::sales(40), 25))
}

fn history(values: &[f64]) -> WeeklySales {
    WeeklySales::from_values(common::first_week(), values).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn forecast_has_requested_length_and_weekly_dates(
        values in prop::collection::vec(0.0f64..50_000.0, 4..60),
        weeks in 1i64..=80,
    ) {
        let history = history(&values);
        let points = RecursiveForecaster::default()
            .forecast_history(model(), &history, weeks)
            .unwrap();

        prop_assert_eq!(points.len(), weeks as usize);
        let mut expected = history.last_week().unwrap();
        for point in &points {
            expected += Duration::days(7);
            prop_assert_eq!(point.date, expected);
            prop_assert!(point.sales.is_finite());
        }
    }

    #[test]
    fn forecast_is_idempotent(
        values in prop::collection::vec(0.0f64..50_000.0, 4..40),
        weeks in 1i64..=30,
    ) {
        let history = history(&values);
        let forecaster = RecursiveForecaster::default();
        let first = forecaster.forecast_history(model(), &history, weeks).unwrap();
        let second = forecaster.forecast_history(model(), &history, weeks).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn non_positive_horizon_is_rejected(weeks in -1_000i64..=0) {
        let history = history(&[1.0, 2.0, 3.0, 4.0]);
        prop_assert!(RecursiveForecaster::default()
            .forecast_history(model(), &history, weeks)
            .is_err());
    }

    #[test]
    fn first_step_matches_training_features(
        values in prop::collection::vec(0.0f64..50_000.0, 5..40),
    ) {
        // The last observed week is predicted both as a training row and as
        // the first forecast step from the preceding weeks.
        let full = history(&values);
        let rows = build_feature_rows(&full);
        let last_row = rows.last().unwrap();

        let prefix = history(&values[..values.len() - 1]);
        let seed = ForecastSeed::from_history(&prefix).unwrap();
        let step = RecursiveForecaster::default().forecast(model(), &seed, 1).unwrap();

        let names = feature_names();
        let from_training = model().predict(&last_row.features.to_vector(&names).unwrap()).unwrap();
        prop_assert_eq!(step[0].date, last_row.week);
        prop_assert_eq!(step[0].sales, from_training);
    }
}
