//! Daily bucket primitives and period arithmetic.
//!
//! Raw log timestamps are grouped into UTC calendar-day counts by the
//! storage layer; everything downstream (streaks, volume, heatmaps) works
//! over these buckets. Weekly and monthly rollups are derived here rather
//! than in SQL because the bundled SQLite lacks ISO-week strftime tokens.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of log entries on one UTC calendar day.
///
/// Sparse: days with zero activity are omitted by the daily bucketer;
/// zero-filling is the heatmap builder's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBucket {
    /// UTC calendar day
    pub date: NaiveDate,
    /// Number of log entries on that day
    pub count: i64,
}

/// Period selector for filtered analytics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Week,
    Month,
    Quarter,
    Year,
    #[default]
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
            Period::All => "all",
        }
    }

    /// Lower bound for period-filtered queries: midnight UTC of the day
    /// one week/month/quarter/year before `now`. `All` has no bound.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let lower = match self {
            Period::Week => today.checked_sub_days(Days::new(7)),
            Period::Month => today.checked_sub_months(Months::new(1)),
            Period::Quarter => today.checked_sub_months(Months::new(3)),
            Period::Year => today.checked_sub_months(Months::new(12)),
            Period::All => return None,
        };
        Some(midnight_utc(lower.unwrap_or(NaiveDate::MIN)))
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "quarter" => Ok(Period::Quarter),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            _ => Err(format!("unknown period: {}", s)),
        }
    }
}

/// Log count for one ISO week, keyed `YYYY-Www` (ISO week-year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyBucket {
    pub week: String,
    pub count: i64,
}

/// Log count for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub month: u32,
    pub year: i32,
    pub count: i64,
}

/// Roll daily buckets up into ISO weeks, ascending by week key.
pub fn weekly_rollup(days: &[DailyBucket]) -> Vec<WeeklyBucket> {
    let mut map: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for d in days {
        let iso = d.date.iso_week();
        *map.entry((iso.year(), iso.week())).or_insert(0) += d.count;
    }
    map.into_iter()
        .map(|((year, week), count)| WeeklyBucket {
            week: format!("{}-W{:02}", year, week),
            count,
        })
        .collect()
}

/// Roll daily buckets up into calendar months, ascending by (year, month).
pub fn monthly_rollup(days: &[DailyBucket]) -> Vec<MonthlyBucket> {
    let mut map: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for d in days {
        *map.entry((d.date.year(), d.date.month())).or_insert(0) += d.count;
    }
    map.into_iter()
        .map(|((year, month), count)| MonthlyBucket { month, year, count })
        .collect()
}

/// Three-letter month name for chart labels (1-12).
pub fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "Unknown",
    }
}

/// Midnight UTC for a calendar day.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Elapsed days between two instants, rounded up.
pub fn elapsed_days_ceil(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let secs = (end - start).num_seconds();
    (secs as f64 / 86_400.0).ceil() as i64
}

/// Days since a subscription started, clamped to at least 1 so it is always
/// safe as a denominator.
pub fn days_subscribed(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    elapsed_days_ceil(started_at, now).max(1)
}
