//! Training data: the orders and order-items CSV exports, joined and
//! resampled into a gap-free weekly sales series.

pub mod loader;
pub mod resample;

pub use loader::*;
pub use resample::*;

use thiserror::Error;
use tracing::info;

use crate::config::DataConfig;
use crate::domain::{SalesSeriesError, WeeklySales};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("order {order_id} has unparseable purchase timestamp '{value}'")]
    Timestamp { order_id: String, value: String },

    #[error("no order lines left after joining orders with items")]
    Empty,

    #[error("weekly series is inconsistent: {0}")]
    Series(#[from] SalesSeriesError),
}

/// Load both CSV exports and resample them into weekly totals.
pub fn load_weekly_sales(cfg: &DataConfig) -> Result<WeeklySales, DataError> {
    let lines = load_order_lines(&cfg.orders_path, &cfg.items_path)?;
    let sales = aggregate_weekly(&lines, &ResampleOptions::from(cfg))?;
    info!(
        order_lines = lines.len(),
        weeks = sales.len(),
        first_week = ?sales.first_week(),
        last_week = ?sales.last_week(),
        "loaded weekly sales"
    );
    Ok(sales)
}
