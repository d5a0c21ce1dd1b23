//! Period-over-period volume comparison.

use super::buckets::{midnight_utc, DailyBucket, Period};
use super::round1;
use super::volume::RollingWindows;
use chrono::{DateTime, Datelike, Days, Months, Utc};
use serde::Serialize;

/// One side of a comparison: total count and per-day average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSide {
    pub count: i64,
    pub average: f64,
}

/// Direction label for the percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTrend {
    Up,
    Down,
    Stable,
}

/// Comparison section of a subscription report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub period_label: String,
    pub current: PeriodSide,
    pub previous: PeriodSide,
    pub percent_change: i64,
    pub trend: ChangeTrend,
}

/// Percent change between two counts, rounded to the nearest integer.
/// A zero previous count yields 100 when anything happened, else 0.
pub fn percent_change(current: i64, previous: i64) -> i64 {
    if previous > 0 {
        ((current - previous) as f64 / previous as f64 * 100.0).round() as i64
    } else if current > 0 {
        100
    } else {
        0
    }
}

/// Compare the current period against the previous one.
///
/// Week and all-time selectors compare the trailing 7 days against the 7
/// days before that. Month, quarter, and year selectors compare the current
/// calendar month against the previous one, each side's average normalized
/// by its elapsed day count (days so far for the current month, full length
/// for the previous).
pub fn compare(
    days: &[DailyBucket],
    windows: &RollingWindows,
    period: Period,
    now: DateTime<Utc>,
) -> Comparison {
    let (period_label, current, previous) = match period {
        Period::Month | Period::Quarter | Period::Year => {
            let this_month_first = now
                .date_naive()
                .with_day(1)
                .unwrap_or_else(|| now.date_naive());
            let last_month_first = this_month_first
                .checked_sub_months(Months::new(1))
                .unwrap_or(this_month_first);
            let this_month_start = midnight_utc(this_month_first);
            let last_month_start = midnight_utc(last_month_first);

            let mut this_month = 0i64;
            let mut last_month = 0i64;
            for d in days {
                let instant = midnight_utc(d.date);
                if instant >= this_month_start {
                    this_month += d.count;
                } else if instant >= last_month_start {
                    last_month += d.count;
                }
            }

            let this_month_days = i64::from(now.day()).max(1);
            let last_month_days = this_month_first
                .checked_sub_days(Days::new(1))
                .map(|d| i64::from(d.day()))
                .unwrap_or(1)
                .max(1);

            (
                "This Month vs Last Month".to_string(),
                PeriodSide {
                    count: this_month,
                    average: round1(this_month as f64 / this_month_days as f64),
                },
                PeriodSide {
                    count: last_month,
                    average: round1(last_month as f64 / last_month_days as f64),
                },
            )
        }
        Period::Week | Period::All => (
            "This Week vs Last Week".to_string(),
            PeriodSide {
                count: windows.last_7,
                average: round1(windows.last_7 as f64 / 7.0),
            },
            PeriodSide {
                count: windows.prior_7,
                average: round1(windows.prior_7 as f64 / 7.0),
            },
        ),
    };

    let change = percent_change(current.count, previous.count);
    let trend = if change > 5 {
        ChangeTrend::Up
    } else if change < -5 {
        ChangeTrend::Down
    } else {
        ChangeTrend::Stable
    };

    Comparison {
        period_label,
        current,
        previous,
        percent_change: change,
        trend,
    }
}
