use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One predicted week. `date` serializes as `YYYY-MM-DD`.
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    #[cfg_attr(feature = "swagger", schema(value_type = String, format = Date))]
    pub date: NaiveDate,
    pub sales: f64,
}
