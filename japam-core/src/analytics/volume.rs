//! Volume and pace analysis: best periods, rolling windows, averages,
//! goal progress, completion projection, and pace trend.

use super::buckets::{midnight_utc, month_abbrev, DailyBucket, MonthlyBucket, WeeklyBucket};
use super::round1;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// The single calendar day with the highest count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestDay {
    pub date: NaiveDate,
    pub count: i64,
}

/// The ISO week with the highest count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestWeek {
    /// ISO week key, serialized under the key clients already consume
    #[serde(rename = "startDate")]
    pub week: String,
    pub count: i64,
}

/// The calendar month with the highest count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestMonth {
    pub month: String,
    pub year: i32,
    pub count: i64,
}

/// Sums over now-relative trailing windows (not calendar-aligned).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingWindows {
    /// Trailing 7 days
    pub last_7: i64,
    /// Days 8-14 back
    pub prior_7: i64,
    /// Trailing 30 days
    pub last_30: i64,
}

/// Per-day averages over subscription lifetime and trailing windows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Averages {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

/// Pace-based classification of goal progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    OnTrack,
    Behind,
    Ahead,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::OnTrack => "on-track",
            GoalStatus::Behind => "behind",
            GoalStatus::Ahead => "ahead",
            GoalStatus::Completed => "completed",
        }
    }
}

/// Direction of the trailing-7 vs prior-7 pace ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceTrend {
    Accelerating,
    Steady,
    Decelerating,
}

/// Progress section of a subscription report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Percent of goal reached, capped at 100
    pub percent_complete: i64,
    /// Repetitions left to reach the goal, floored at 0
    pub remaining: i64,
    /// Days to completion at the current pace; None when pace or remaining is 0
    pub estimated_days_to_complete: Option<i64>,
    /// Projected completion day; None when no estimate exists
    pub projected_completion_date: Option<NaiveDate>,
    pub status: GoalStatus,
    /// Per-day rate over the trailing 7 days, rounded to 1 decimal
    pub current_pace: f64,
    /// Per-day rate needed to finish, rounded to 1 decimal
    pub required_pace: f64,
    pub pace_trend: PaceTrend,
}

/// Find the best day. Ties resolve to the earliest date regardless of input
/// order.
pub fn best_day(days: &[DailyBucket]) -> Option<BestDay> {
    let mut best: Option<&DailyBucket> = None;
    for d in days {
        let better = match best {
            None => true,
            Some(b) => d.count > b.count || (d.count == b.count && d.date < b.date),
        };
        if better {
            best = Some(d);
        }
    }
    best.map(|b| BestDay { date: b.date, count: b.count })
}

/// Find the best ISO week. Ties resolve to the earliest week key.
pub fn best_week(weeks: &[WeeklyBucket]) -> Option<BestWeek> {
    let mut best: Option<&WeeklyBucket> = None;
    for w in weeks {
        let better = match best {
            None => true,
            Some(b) => w.count > b.count || (w.count == b.count && w.week < b.week),
        };
        if better {
            best = Some(w);
        }
    }
    best.map(|b| BestWeek { week: b.week.clone(), count: b.count })
}

/// Find the best calendar month. Ties resolve to the earliest month.
pub fn best_month(months: &[MonthlyBucket]) -> Option<BestMonth> {
    let mut best: Option<&MonthlyBucket> = None;
    for m in months {
        let better = match best {
            None => true,
            Some(b) => {
                m.count > b.count
                    || (m.count == b.count && (m.year, m.month) < (b.year, b.month))
            }
        };
        if better {
            best = Some(m);
        }
    }
    best.map(|b| BestMonth {
        month: month_abbrev(b.month).to_string(),
        year: b.year,
        count: b.count,
    })
}

/// Sum daily buckets against trailing-window cutoffs relative to `now`.
///
/// A bucket belongs to a window when its midnight-UTC instant is at or after
/// the cutoff instant, matching the day-boundary semantics of the rest of
/// the pipeline.
pub fn rolling_windows(days: &[DailyBucket], now: DateTime<Utc>) -> RollingWindows {
    let last_7_cutoff = now - Duration::days(7);
    let prior_7_cutoff = now - Duration::days(14);
    let last_30_cutoff = now - Duration::days(30);

    let mut windows = RollingWindows::default();
    for d in days {
        let instant = midnight_utc(d.date);
        if instant >= last_7_cutoff {
            windows.last_7 += d.count;
        }
        if instant >= prior_7_cutoff && instant < last_7_cutoff {
            windows.prior_7 += d.count;
        }
        if instant >= last_30_cutoff {
            windows.last_30 += d.count;
        }
    }
    windows
}

/// Lifetime and trailing-window per-day averages.
///
/// The daily average is 0 when there are no active days at all; otherwise
/// it divides the cumulative sum by the (min-1-clamped) subscription age.
pub fn averages(
    current_sum: i64,
    days_subscribed: i64,
    active_days: i64,
    windows: &RollingWindows,
) -> Averages {
    let daily = if active_days > 0 {
        current_sum as f64 / days_subscribed.max(1) as f64
    } else {
        0.0
    };
    Averages {
        daily,
        weekly: windows.last_7 as f64 / 7.0,
        monthly: windows.last_30 as f64 / 30.0,
    }
}

/// Derive the progress section from the goal, cumulative sum, and windows.
pub fn progress(
    current_sum: i64,
    goal: i64,
    days_subscribed: i64,
    windows: &RollingWindows,
    now: DateTime<Utc>,
) -> Progress {
    let goal = goal.max(1);
    let percent_complete =
        (((current_sum as f64 / goal as f64) * 100.0).round() as i64).min(100);
    let remaining = (goal - current_sum).max(0);

    // Pace over the trailing 7 days, in repetitions per day
    let current_pace = windows.last_7 as f64 / 7.0;
    let required_pace = if remaining > 0 {
        remaining as f64 / days_subscribed.max(1) as f64
    } else {
        0.0
    };

    let (estimated_days_to_complete, projected_completion_date) =
        if current_pace > 0.0 && remaining > 0 {
            let days = (remaining as f64 / current_pace).ceil() as i64;
            (Some(days), Some((now + Duration::days(days)).date_naive()))
        } else {
            (None, None)
        };

    let status = if current_sum >= goal {
        GoalStatus::Completed
    } else if current_pace > 0.0 && required_pace > 0.0 {
        let ratio = current_pace / required_pace;
        if ratio >= 1.2 {
            GoalStatus::Ahead
        } else if ratio < 0.8 {
            GoalStatus::Behind
        } else {
            GoalStatus::OnTrack
        }
    } else {
        GoalStatus::OnTrack
    };

    let pace_trend = if windows.prior_7 > 0 {
        let ratio = windows.last_7 as f64 / windows.prior_7 as f64;
        if ratio > 1.15 {
            PaceTrend::Accelerating
        } else if ratio < 0.85 {
            PaceTrend::Decelerating
        } else {
            PaceTrend::Steady
        }
    } else {
        PaceTrend::Steady
    };

    Progress {
        percent_complete,
        remaining,
        estimated_days_to_complete,
        projected_completion_date,
        status,
        current_pace: round1(current_pace),
        required_pace: round1(required_pace),
        pace_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn bucket(date: &str, count: i64) -> DailyBucket {
        DailyBucket { date: d(date), count }
    }

    #[test]
    fn test_best_day_tie_keeps_earliest() {
        let days = vec![bucket("2026-08-20", 5), bucket("2026-08-10", 5), bucket("2026-08-15", 3)];
        let best = best_day(&days).unwrap();
        assert_eq!(best.date, d("2026-08-10"));
        assert_eq!(best.count, 5);
    }

    #[test]
    fn test_best_day_empty() {
        assert!(best_day(&[]).is_none());
    }

    #[test]
    fn test_rolling_windows_partition() {
        let now = ts("2026-08-25T12:00:00Z");
        let days = vec![
            bucket("2026-08-25", 2),  // last 7
            bucket("2026-08-19", 3),  // last 7 (midnight >= now-7d)
            bucket("2026-08-15", 4),  // prior 7
            bucket("2026-08-01", 10), // last 30 only
            bucket("2026-06-01", 99), // outside all windows
        ];
        let w = rolling_windows(&days, now);
        assert_eq!(w.last_7, 5);
        assert_eq!(w.prior_7, 4);
        assert_eq!(w.last_30, 19);
    }

    #[test]
    fn test_averages_zero_when_no_active_days() {
        let a = averages(50, 10, 0, &RollingWindows::default());
        assert_eq!(a.daily, 0.0);
    }

    #[test]
    fn test_completed_regardless_of_pace() {
        let p = progress(100, 100, 10, &RollingWindows::default(), Utc::now());
        assert_eq!(p.status, GoalStatus::Completed);
        assert_eq!(p.percent_complete, 100);
        assert_eq!(p.remaining, 0);
        assert!(p.estimated_days_to_complete.is_none());
    }

    #[test]
    fn test_status_ratio_boundaries() {
        // days_subscribed 7 makes required_pace = remaining / 7.
        // last_7 = remaining * 1.2 gives ratio exactly 1.2 -> ahead.
        let windows = RollingWindows { last_7: 84, prior_7: 0, last_30: 84 };
        let p = progress(30, 100, 7, &windows, Utc::now());
        // current_pace = 12, required_pace = 10, ratio = 1.2
        assert_eq!(p.status, GoalStatus::Ahead);

        // ratio exactly 0.8 is not behind (boundary exclusive below 0.8)
        let windows = RollingWindows { last_7: 56, prior_7: 0, last_30: 56 };
        let p = progress(30, 100, 7, &windows, Utc::now());
        // current_pace = 8, required_pace = 10, ratio = 0.8
        assert_eq!(p.status, GoalStatus::OnTrack);

        let windows = RollingWindows { last_7: 49, prior_7: 0, last_30: 49 };
        let p = progress(30, 100, 7, &windows, Utc::now());
        // current_pace = 7, required_pace = 10, ratio = 0.7
        assert_eq!(p.status, GoalStatus::Behind);
    }

    #[test]
    fn test_zero_pace_defaults_on_track() {
        let p = progress(10, 100, 30, &RollingWindows::default(), Utc::now());
        assert_eq!(p.status, GoalStatus::OnTrack);
        assert!(p.projected_completion_date.is_none());
    }

    #[test]
    fn test_projection() {
        let now = ts("2026-08-25T00:00:00Z");
        let windows = RollingWindows { last_7: 14, prior_7: 7, last_30: 21 };
        let p = progress(80, 100, 40, &windows, now);
        // pace 2/day, remaining 20 -> 10 days
        assert_eq!(p.estimated_days_to_complete, Some(10));
        assert_eq!(p.projected_completion_date, Some(d("2026-09-04")));
        assert_eq!(p.pace_trend, PaceTrend::Accelerating);
    }

    #[test]
    fn test_pace_trend_zero_prior_is_steady() {
        let windows = RollingWindows { last_7: 50, prior_7: 0, last_30: 50 };
        let p = progress(10, 1000, 100, &windows, Utc::now());
        assert_eq!(p.pace_trend, PaceTrend::Steady);
    }

    #[test]
    fn test_pace_trend_decelerating() {
        let windows = RollingWindows { last_7: 4, prior_7: 10, last_30: 14 };
        let p = progress(14, 100, 14, &windows, Utc::now());
        assert_eq!(p.pace_trend, PaceTrend::Decelerating);
    }
}
