//! Rolling-window arithmetic and trend classification.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

pub const SALES_WINDOW_DAYS: usize = 30;
pub const SHORT_WINDOW_DAYS: usize = 7;
/// Days-of-cover at or below this triggers a restock alert.
pub const RESTOCK_COVER_DAYS: f64 = 14.0;

const TREND_FAST_RATIO: f64 = 1.5;
const TREND_SLOW_RATIO: f64 = 0.7;

/// Fixed-length daily sales series ending at `today` (inclusive), oldest
/// first. Days without recorded sales are zero, not absent.
pub fn build_daily_series(rows: &[(NaiveDate, i64)], today: NaiveDate) -> Vec<i64> {
    let start = today - Duration::days(SALES_WINDOW_DAYS as i64 - 1);
    let mut series = vec![0i64; SALES_WINDOW_DAYS];
    for (day, qty) in rows {
        let offset = (*day - start).num_days();
        if (0..SALES_WINDOW_DAYS as i64).contains(&offset) {
            series[offset as usize] = *qty;
        }
    }
    series
}

pub fn mean(series: &[i64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().sum::<i64>() as f64 / series.len() as f64
}

/// None whenever demand is zero: never a division by zero, never infinity.
pub fn days_of_cover(current_stock: i64, rolling30: f64) -> Option<f64> {
    if rolling30 > 0.0 {
        Some(current_stock as f64 / rolling30)
    } else {
        None
    }
}

/// Qualitative sales velocity vs a historical baseline. Derived at read
/// time for display; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Fast,
    Steady,
    Slow,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Fast => "fast",
            Trend::Steady => "steady",
            Trend::Slow => "slow",
        }
    }
}

/// Month-to-date quantity against the same elapsed days of the previous
/// month; without a usable previous-month baseline, the short-window average
/// against the stored 30-day average with the same thresholds.
pub fn classify_trend(
    month_to_date: i64,
    prev_month_to_date: Option<i64>,
    rolling7: f64,
    rolling30: f64,
) -> Trend {
    match prev_month_to_date {
        Some(prev) if prev > 0 => {
            let current = month_to_date as f64;
            let prev = prev as f64;
            if current >= TREND_FAST_RATIO * prev {
                Trend::Fast
            } else if current <= TREND_SLOW_RATIO * prev {
                Trend::Slow
            } else {
                Trend::Steady
            }
        }
        _ => {
            if rolling30 <= 0.0 {
                if rolling7 > 0.0 {
                    Trend::Fast
                } else {
                    Trend::Steady
                }
            } else if rolling7 >= TREND_FAST_RATIO * rolling30 {
                Trend::Fast
            } else if rolling7 <= TREND_SLOW_RATIO * rolling30 {
                Trend::Slow
            } else {
                Trend::Steady
            }
        }
    }
}

/// Month-to-date window for `today` plus the same elapsed number of days in
/// the previous calendar month, clamped to that month's end.
pub fn month_to_date_windows(
    today: NaiveDate,
) -> ((NaiveDate, NaiveDate), (NaiveDate, NaiveDate)) {
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let (prev_year, prev_month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let prev_first = NaiveDate::from_ymd_opt(prev_year, prev_month, 1).unwrap_or(first);
    let prev_last = first - Duration::days(1);
    let elapsed = i64::from(today.day()) - 1;
    let prev_to = std::cmp::min(prev_first + Duration::days(elapsed), prev_last);
    ((first, today), (prev_first, prev_to))
}
