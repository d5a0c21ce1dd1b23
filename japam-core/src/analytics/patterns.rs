//! Pattern insights: hourly and day-of-week histograms, time-of-day
//! preference, and the consistency score.

use serde::Serialize;

/// Day names indexed 0=Sunday through 6=Saturday.
pub const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Coarse time-of-day label for the most active hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Label for an hour of day: before noon is morning, before 5pm is
    /// afternoon, the rest is evening.
    pub fn from_hour(hour: u8) -> Self {
        if hour < 12 {
            TimeOfDay::Morning
        } else if hour < 17 {
            TimeOfDay::Afternoon
        } else {
            TimeOfDay::Evening
        }
    }
}

/// One hour bucket of the 24-slot histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: i64,
}

/// One day-of-week bucket keyed by day name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: &'static str,
    pub count: i64,
}

/// Time-of-day subsection of pattern insights.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfDayInsights {
    pub most_active_hour: u8,
    pub preference: TimeOfDay,
    pub hourly_distribution: Vec<HourCount>,
}

/// Day-of-week subsection of pattern insights.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOfWeekInsights {
    pub most_active_day: &'static str,
    pub weekday_total: i64,
    pub weekend_total: i64,
    pub day_distribution: Vec<DayCount>,
}

/// Build the hourly histogram section from a dense 24-slot distribution.
///
/// Ties resolve to the lowest hour index; an all-zero history reports
/// hour 0 (morning).
pub fn time_of_day(distribution: &[i64; 24]) -> TimeOfDayInsights {
    let mut most_active_hour = 0u8;
    let mut max_count = 0i64;
    let mut hourly = Vec::with_capacity(24);
    for (hour, &count) in distribution.iter().enumerate() {
        hourly.push(HourCount { hour: hour as u8, count });
        if count > max_count {
            max_count = count;
            most_active_hour = hour as u8;
        }
    }
    TimeOfDayInsights {
        most_active_hour,
        preference: TimeOfDay::from_hour(most_active_hour),
        hourly_distribution: hourly,
    }
}

/// Build the day-of-week section from a dense 7-slot distribution
/// (0=Sunday).
///
/// Ties resolve to the earliest day in Sunday-first order; an all-zero
/// history reports Monday.
pub fn day_of_week(distribution: &[i64; 7]) -> DayOfWeekInsights {
    let mut most_active_day = "Mon";
    let mut max_count = 0i64;
    let mut weekday_total = 0i64;
    let mut weekend_total = 0i64;
    let mut days = Vec::with_capacity(7);
    for (idx, &count) in distribution.iter().enumerate() {
        let name = DAY_NAMES[idx];
        days.push(DayCount { day: name, count });
        if count > max_count {
            max_count = count;
            most_active_day = name;
        }
        if (1..=5).contains(&idx) {
            weekday_total += count;
        } else {
            weekend_total += count;
        }
    }
    DayOfWeekInsights {
        most_active_day,
        weekday_total,
        weekend_total,
        day_distribution: days,
    }
}

/// Fraction of subscribed days with any activity, as a 0-100 score.
pub fn consistency_score(active_days: i64, days_subscribed: i64) -> i64 {
    let score = (active_days as f64 / days_subscribed.max(1) as f64 * 100.0).round() as i64;
    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_labels() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(16), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Evening);
    }

    #[test]
    fn test_hourly_histogram_tie_keeps_lowest_hour() {
        let mut dist = [0i64; 24];
        dist[6] = 4;
        dist[18] = 4;
        let insights = time_of_day(&dist);
        assert_eq!(insights.most_active_hour, 6);
        assert_eq!(insights.preference, TimeOfDay::Morning);
        assert_eq!(insights.hourly_distribution.len(), 24);
        assert_eq!(insights.hourly_distribution[18].count, 4);
    }

    #[test]
    fn test_quiet_history_defaults() {
        let insights = time_of_day(&[0; 24]);
        assert_eq!(insights.most_active_hour, 0);

        let days = day_of_week(&[0; 7]);
        assert_eq!(days.most_active_day, "Mon");
    }

    #[test]
    fn test_weekday_weekend_split() {
        // Sun=2, Mon=3, Fri=5, Sat=7
        let dist = [2, 3, 0, 0, 0, 5, 7];
        let insights = day_of_week(&dist);
        assert_eq!(insights.weekday_total, 8);
        assert_eq!(insights.weekend_total, 9);
        assert_eq!(insights.most_active_day, "Sat");
        assert_eq!(insights.day_distribution[0], DayCount { day: "Sun", count: 2 });
    }

    #[test]
    fn test_consistency_score_caps_at_100() {
        assert_eq!(consistency_score(5, 10), 50);
        assert_eq!(consistency_score(10, 10), 100);
        assert_eq!(consistency_score(15, 10), 100);
        assert_eq!(consistency_score(0, 0), 0);
        assert_eq!(consistency_score(1, 3), 33);
    }
}
