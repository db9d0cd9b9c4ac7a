use chrono::NaiveDateTime;
use serde::Deserialize;
use std::{collections::HashMap, fs::File, io::{BufReader, Read}, path::Path};
use tracing::debug;

use super::DataError;

pub const PURCHASE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row of the orders export; unused columns are ignored.
#[derive(Debug, Deserialize)]
struct OrderRecord {
    order_id: String,
    order_purchase_timestamp: String,
}

/// Row of the order-items export; unused columns are ignored.
#[derive(Debug, Deserialize)]
struct OrderItemRecord {
    order_id: String,
    price: f64,
}

/// One sold item stamped with its order's purchase time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    pub purchased_at: NaiveDateTime,
    pub price: f64,
}

pub fn load_order_lines(
    orders_path: &Path,
    items_path: &Path,
) -> Result<Vec<OrderLine>, DataError> {
    let orders = open(orders_path)?;
    let items = open(items_path)?;
    join_order_lines(orders, items)
}

fn open(path: &Path) -> Result<BufReader<File>, DataError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Inner join of items onto orders by `order_id`.
///
/// Items referencing an unknown order are skipped, matching an inner merge.
pub fn join_order_lines<O: Read, I: Read>(
    orders: O,
    items: I,
) -> Result<Vec<OrderLine>, DataError> {
    let mut purchase_times = HashMap::new();
    let mut reader = csv::Reader::from_reader(orders);
    for record in reader.deserialize::<OrderRecord>() {
        let record = record?;
        let purchased_at = NaiveDateTime::parse_from_str(
            record.order_purchase_timestamp.trim(),
            PURCHASE_TIMESTAMP_FORMAT,
        )
        .map_err(|_| DataError::Timestamp {
            order_id: record.order_id.clone(),
            value: record.order_purchase_timestamp.clone(),
        })?;
        purchase_times.insert(record.order_id, purchased_at);
    }

    let mut lines = Vec::new();
    let mut orphaned = 0usize;
    let mut reader = csv::Reader::from_reader(items);
    for record in reader.deserialize::<OrderItemRecord>() {
        let record = record?;
        match purchase_times.get(&record.order_id) {
            Some(&purchased_at) => lines.push(OrderLine {
                order_id: record.order_id,
                purchased_at,
                price: record.price,
            }),
            None => orphaned += 1,
        }
    }

    if orphaned > 0 {
        debug!(orphaned, "skipped order items without a matching order");
    }
    if lines.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(lines)
}
