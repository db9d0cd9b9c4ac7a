use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use super::{DataError, OrderLine};
use crate::config::DataConfig;
use crate::domain::{one_week, WeeklyPoint, WeeklySales};

#[derive(Debug, Clone, Default)]
pub struct ResampleOptions {
    /// Weeks labelled before this date are discarded.
    pub start_week: Option<NaiveDate>,
    /// Discard the newest week after filtering.
    pub drop_last_week: bool,
}

impl From<&DataConfig> for ResampleOptions {
    fn from(cfg: &DataConfig) -> Self {
        Self {
            start_week: cfg.start_week,
            drop_last_week: cfg.drop_last_week,
        }
    }
}

/// Monday label of the right-closed week containing `date`.
///
/// Tuesday through Monday map to that Monday, so a Monday is its own label.
pub fn week_label(date: NaiveDate) -> NaiveDate {
    let days_to_monday = (7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(days_to_monday as i64)
}

/// Sum line prices into Monday-labelled weeks, zero-filling empty weeks.
pub fn aggregate_weekly(
    lines: &[OrderLine],
    opts: &ResampleOptions,
) -> Result<WeeklySales, DataError> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for line in lines {
        *totals.entry(week_label(line.purchased_at.date())).or_default() += line.price;
    }

    let (Some((&first, _)), Some((&last, _))) = (totals.first_key_value(), totals.last_key_value())
    else {
        return Err(DataError::Empty);
    };

    let mut points = Vec::new();
    let mut week = first;
    while week <= last {
        points.push(WeeklyPoint {
            week,
            total_sales: totals.get(&week).copied().unwrap_or(0.0),
        });
        week += one_week();
    }

    if let Some(start) = opts.start_week {
        points.retain(|p| p.week >= start);
    }
    if opts.drop_last_week {
        points.pop();
    }

    Ok(WeeklySales::new(points)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rstest::rstest;

    fn line(ts: &str, price: f64) -> OrderLine {
        OrderLine {
            order_id: ts.to_string(),
            purchased_at: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            price,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[rstest]
    #[case("2017-01-09", "2017-01-09")] // Monday
    #[case("2017-01-10", "2017-01-16")] // Tuesday
    #[case("2017-01-15", "2017-01-16")] // Sunday
    #[case("2017-12-31", "2018-01-01")] // year boundary
    fn test_week_label(#[case] day: &str, #[case] label: &str) {
        assert_eq!(week_label(date(day)), date(label));
    }

    #[test]
    fn test_monday_evening_stays_in_its_week() {
        let lines = vec![line("2017-01-09 23:59:59", 5.0), line("2017-01-10 00:00:01", 7.0)];
        let sales = aggregate_weekly(&lines, &ResampleOptions::default()).unwrap();
        assert_eq!(sales.values(), vec![5.0, 7.0]);
        assert_eq!(sales.first_week(), Some(date("2017-01-09")));
    }

    #[test]
    fn test_gaps_are_zero_filled() {
        let lines = vec![line("2017-01-03 10:00:00", 10.0), line("2017-01-24 10:00:00", 20.0)];
        let sales = aggregate_weekly(&lines, &ResampleOptions::default()).unwrap();
        assert_eq!(sales.values(), vec![10.0, 0.0, 0.0, 20.0]);
    }

    #[test]
    fn test_start_week_and_drop_last() {
        let lines = vec![
            line("2017-01-02 10:00:00", 1.0),
            line("2017-01-03 10:00:00", 2.0),
            line("2017-01-10 10:00:00", 3.0),
            line("2017-01-17 10:00:00", 4.0),
        ];
        let opts = ResampleOptions {
            start_week: Some(date("2017-01-09")),
            drop_last_week: true,
        };
        let sales = aggregate_weekly(&lines, &opts).unwrap();
        assert_eq!(sales.first_week(), Some(date("2017-01-09")));
        assert_eq!(sales.values(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_keep_last_week_when_disabled() {
        let lines = vec![line("2017-01-03 10:00:00", 2.0), line("2017-01-10 10:00:00", 3.0)];
        let sales = aggregate_weekly(&lines, &ResampleOptions::default()).unwrap();
        assert_eq!(sales.len(), 2);
    }

    #[test]
    fn test_empty_lines_is_error() {
        assert!(matches!(
            aggregate_weekly(&[], &ResampleOptions::default()),
            Err(DataError::Empty)
        ));
    }
}
