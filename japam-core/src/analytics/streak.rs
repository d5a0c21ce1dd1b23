//! Consecutive-day streak calculation.

use super::buckets::DailyBucket;
use chrono::{Days, NaiveDate};
use std::collections::BTreeSet;

/// Current and longest consecutive-day streaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streaks {
    /// Consecutive active days ending at today or yesterday; 0 otherwise
    pub current: i64,
    /// Longest run of consecutive active days anywhere in history
    pub longest: i64,
}

/// Compute streaks from daily buckets.
///
/// Input order does not matter: the buckets are reduced to a set of active
/// dates first. The longest streak walks every calendar day from the
/// earliest active date through `today` inclusive so that gaps of any
/// length reset the running counter. The current streak only counts when
/// the most recent active date is within one day of `today`; it then walks
/// backward day by day until the first missing date.
pub fn calculate(days: &[DailyBucket], today: NaiveDate) -> Streaks {
    let active: BTreeSet<NaiveDate> = days.iter().map(|d| d.date).collect();

    let (earliest, most_recent) = match (active.first(), active.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Streaks::default(),
    };

    let mut longest = 0i64;
    let mut run = 0i64;
    let mut cursor = earliest;
    while cursor <= today {
        if active.contains(&cursor) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
        cursor = match cursor.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    let mut current = 0i64;
    if (today - most_recent).num_days() <= 1 {
        let mut expected = most_recent;
        while active.contains(&expected) {
            current += 1;
            expected = match expected.checked_sub_days(Days::new(1)) {
                Some(prev) => prev,
                None => break,
            };
        }
    }

    Streaks { current, longest }
}
