//! Weekly retail sales forecaster.
//!
//! Aggregates order line items into a weekly sales series, fits a
//! gradient-boosted regressor on lagged features and serves recursive
//! multi-week forecasts over HTTP.

pub mod api;
pub mod config;
pub mod controller;
pub mod data;
pub mod domain;
pub mod forecast;
pub mod ml;
pub mod telemetry;
