use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of one sales bucket.
pub fn one_week() -> Duration {
    Duration::weeks(1)
}

/// Total sales for one Monday-labelled week
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeeklyPoint {
    pub week: NaiveDate,
    pub total_sales: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum SalesSeriesError {
    #[error("week {week} is not exactly one week after {previous}")]
    Gap { previous: NaiveDate, week: NaiveDate },

    #[error("week {week} has invalid total sales {value}")]
    InvalidTotal { week: NaiveDate, value: f64 },
}

/// Gap-free weekly sales history, oldest first.
///
/// Consecutive weeks are exactly seven days apart, so a position `i - 4`
/// always refers to the calendar week four weeks before `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySales {
    points: Vec<WeeklyPoint>,
}

impl WeeklySales {
    pub fn new(points: Vec<WeeklyPoint>) -> Result<Self, SalesSeriesError> {
        for point in &points {
            if !point.total_sales.is_finite() || point.total_sales < 0.0 {
                return Err(SalesSeriesError::InvalidTotal {
                    week: point.week,
                    value: point.total_sales,
                });
            }
        }
        for pair in points.windows(2) {
            if pair[1].week - pair[0].week != one_week() {
                return Err(SalesSeriesError::Gap {
                    previous: pair[0].week,
                    week: pair[1].week,
                });
            }
        }
        Ok(Self { points })
    }

    /// Build a series of consecutive weeks starting at `first_week`.
    pub fn from_values(first_week: NaiveDate, values: &[f64]) -> Result<Self, SalesSeriesError> {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &total_sales)| WeeklyPoint {
                week: first_week + one_week() * i as i32,
                total_sales,
            })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[WeeklyPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total_sales).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_week(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.week)
    }

    pub fn last_week(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.week)
    }

    /// The newest `n` points, or all of them when the series is shorter.
    pub fn tail(&self, n: usize) -> &[WeeklyPoint] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}
