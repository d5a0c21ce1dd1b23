//! Calendar heatmap series and the most-consistent-week record.

use super::buckets::DailyBucket;
use super::round1;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The best 7-day stretch of a heatmap series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistentWeek {
    pub start_date: NaiveDate,
    pub avg_per_day: f64,
}

/// Build a dense heatmap series covering the trailing window.
///
/// The series runs from `window_days` before today through today, one
/// entry per calendar day with zeros filled in, so a 90-day window yields
/// 91 entries.
pub fn build(days: &[DailyBucket], window_days: u64, now: DateTime<Utc>) -> Vec<DailyBucket> {
    let counts: BTreeMap<NaiveDate, i64> = days.iter().map(|d| (d.date, d.count)).collect();
    let today = now.date_naive();
    let start = today
        .checked_sub_days(Days::new(window_days))
        .unwrap_or(today);

    let mut series = Vec::with_capacity(window_days as usize + 1);
    let mut cursor = start;
    while cursor <= today {
        series.push(DailyBucket {
            date: cursor,
            count: counts.get(&cursor).copied().unwrap_or(0),
        });
        cursor = match cursor.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    series
}

/// Find the most consistent week in a dense daily series.
///
/// Every 7-day window with at least 5 active days is scored by
/// `active_days * average`; a window only replaces the best when its score
/// is strictly greater, so ties keep the earliest start date. Returns None
/// when no window qualifies.
pub fn most_consistent_week(series: &[DailyBucket]) -> Option<ConsistentWeek> {
    let mut best: Option<(f64, ConsistentWeek)> = None;
    for window in series.windows(7) {
        let active = window.iter().filter(|d| d.count > 0).count() as i64;
        if active < 5 {
            continue;
        }
        let total: i64 = window.iter().map(|d| d.count).sum();
        let avg = total as f64 / 7.0;
        let score = active as f64 * avg;
        let better = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((
                score,
                ConsistentWeek {
                    start_date: window[0].date,
                    avg_per_day: round1(avg),
                },
            ));
        }
    }
    best.map(|(_, week)| week)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn bucket(date: &str, count: i64) -> DailyBucket {
        DailyBucket {
            date: date.parse().unwrap(),
            count,
        }
    }

    #[test]
    fn test_window_is_inclusive_of_both_ends() {
        let series = build(&[], 90, ts("2026-08-25T12:00:00Z"));
        assert_eq!(series.len(), 91);
        assert_eq!(series[0].date, "2026-05-27".parse().unwrap());
        assert_eq!(series[90].date, "2026-08-25".parse().unwrap());
        assert!(series.iter().all(|d| d.count == 0));
    }

    #[test]
    fn test_counts_land_on_their_day() {
        let days = vec![bucket("2026-08-24", 5), bucket("2026-01-01", 9)];
        let series = build(&days, 7, ts("2026-08-25T12:00:00Z"));
        assert_eq!(series.len(), 8);
        assert_eq!(series[6].count, 5);
        assert_eq!(series[7].count, 0);
    }

    #[test]
    fn test_consistent_week_requires_five_active_days() {
        // Only 4 active days in any window
        let series = build(
            &[
                bucket("2026-08-20", 3),
                bucket("2026-08-21", 3),
                bucket("2026-08-22", 3),
                bucket("2026-08-23", 3),
            ],
            14,
            ts("2026-08-25T12:00:00Z"),
        );
        assert!(most_consistent_week(&series).is_none());
    }

    #[test]
    fn test_consistent_week_picks_highest_score() {
        // Week A: 5 active days totaling 10. Week B: 6 active days
        // totaling 18, clearly better.
        let days = vec![
            bucket("2026-08-01", 2),
            bucket("2026-08-02", 2),
            bucket("2026-08-03", 2),
            bucket("2026-08-04", 2),
            bucket("2026-08-05", 2),
            bucket("2026-08-15", 3),
            bucket("2026-08-16", 3),
            bucket("2026-08-17", 3),
            bucket("2026-08-18", 3),
            bucket("2026-08-19", 3),
            bucket("2026-08-20", 3),
        ];
        let series = build(&days, 30, ts("2026-08-25T12:00:00Z"));
        let week = most_consistent_week(&series).unwrap();
        assert!(week.start_date >= "2026-08-09".parse().unwrap());
        assert_eq!(week.avg_per_day, 2.6); // 18 / 7 rounded
    }

    #[test]
    fn test_full_week_beats_partial_overlaps() {
        // A 7-day run of equal counts: the window aligned to the run has
        // all 7 days active and outscores every shifted overlap.
        let days: Vec<DailyBucket> = (18..=24)
            .map(|day| bucket(&format!("2026-08-{day:02}"), 2))
            .collect();
        let series = build(&days, 10, ts("2026-08-25T12:00:00Z"));
        let week = most_consistent_week(&series).unwrap();
        assert_eq!(week.start_date, "2026-08-18".parse().unwrap());
    }
}
