//! Recursive multi-step forecasting
//!
//! Each step predicts one week from the sliding window of the four latest
//! known-or-predicted totals, then pushes that prediction into the window.
//! Errors therefore compound over the horizon; no exogenous signal exists
//! for future weeks.

use chrono::NaiveDate;
use tracing::debug;

use super::{features::{SalesFeatures, LOOKBACK_WEEKS}, ForecastError};
use crate::domain::{one_week, ForecastPoint, WeeklySales};
use crate::ml::MLModel;

/// Default upper bound on the forecast horizon (ten years of weeks).
pub const DEFAULT_MAX_HORIZON: usize = 520;

/// The last four weekly totals, oldest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindow {
    values: [f64; LOOKBACK_WEEKS],
}

impl SlidingWindow {
    pub fn new(values: [f64; LOOKBACK_WEEKS]) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64; LOOKBACK_WEEKS] {
        &self.values
    }

    pub fn features_for(&self, target_week: NaiveDate) -> SalesFeatures {
        SalesFeatures::from_lookback(&self.values, target_week)
    }

    /// Drop the oldest value and append `value` as the newest.
    pub fn push(&mut self, value: f64) {
        self.values.rotate_left(1);
        self.values[LOOKBACK_WEEKS - 1] = value;
    }
}

/// Starting point of a forecast: the window plus the week it ends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSeed {
    pub window: SlidingWindow,
    pub last_week: NaiveDate,
}

impl ForecastSeed {
    pub fn new(window: [f64; LOOKBACK_WEEKS], last_week: NaiveDate) -> Self {
        Self {
            window: SlidingWindow::new(window),
            last_week,
        }
    }

    /// Seed from the newest four weeks of `history`.
    pub fn from_history(history: &WeeklySales) -> Result<Self, ForecastError> {
        let tail = history.tail(LOOKBACK_WEEKS);
        let Ok(window) = <[_; LOOKBACK_WEEKS]>::try_from(tail) else {
            return Err(ForecastError::InsufficientHistory {
                required: LOOKBACK_WEEKS,
                available: history.len(),
            });
        };
        Ok(Self::new(window.map(|p| p.total_sales), window[LOOKBACK_WEEKS - 1].week))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecursiveForecaster {
    max_horizon: usize,
}

impl Default for RecursiveForecaster {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HORIZON)
    }
}

impl RecursiveForecaster {
    pub fn new(max_horizon: usize) -> Self {
        Self { max_horizon }
    }

    pub fn max_horizon(&self) -> usize {
        self.max_horizon
    }

    pub fn validate_horizon(&self, steps: i64) -> Result<usize, ForecastError> {
        match usize::try_from(steps) {
            Ok(n) if n >= 1 && n <= self.max_horizon => Ok(n),
            _ => Err(ForecastError::InvalidHorizon {
                requested: steps,
                max: self.max_horizon,
            }),
        }
    }

    /// Forecast `steps` weeks after `seed.last_week`.
    ///
    /// The window is copied, so `seed` can be shared between requests. Any
    /// failed step aborts the whole forecast.
    pub fn forecast(
        &self,
        model: &dyn MLModel,
        seed: &ForecastSeed,
        steps: i64,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let steps = self.validate_horizon(steps)?;
        let order = model.feature_names();

        let mut window = seed.window;
        let mut week = seed.last_week;
        let mut out = Vec::with_capacity(steps);

        for step in 0..steps {
            week += one_week();
            let features = window.features_for(week).to_vector(order)?;
            let sales = model
                .predict(&features)
                .map_err(|source| ForecastError::Inference { step, source })?;
            if !sales.is_finite() {
                return Err(ForecastError::Inference {
                    step,
                    source: anyhow::anyhow!("model returned non-finite value {sales}"),
                });
            }
            out.push(ForecastPoint { date: week, sales });
            window.push(sales);
        }

        debug!(steps, first = ?out.first().map(|p| p.date), "forecast complete");
        Ok(out)
    }

    pub fn forecast_history(
        &self,
        model: &dyn MLModel,
        history: &WeeklySales,
        steps: i64,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let seed = ForecastSeed::from_history(history)?;
        self.forecast(model, &seed, steps)
    }
}
