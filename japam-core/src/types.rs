//! Core domain types for japam
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | A trackable goal with a target repetition count (the goal value) |
//! | **Subscription** | A user's enrollment in an event, carrying a running cumulative count and a start date |
//! | **LogEntry** | One recorded repetition, timestamped, carrying a monotonic cumulative sum for its (user, event) pair |
//! | **Streak** | Consecutive calendar days with at least one log entry |
//!
//! All timestamps are UTC; calendar-day bucketing uses UTC day boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// User
// ============================================

/// A registered account.
///
/// Users are soft-deleted by setting `tombstoned_at`; the nightly metrics
/// snapshot counts tombstoned accounts separately from active ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was soft-deleted, if ever
    pub tombstoned_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user with a generated id.
    pub fn new(name: &str, email: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            created_at,
            tombstoned_at: None,
        }
    }
}

// ============================================
// Event
// ============================================

/// Who can discover and join an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Group,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Group => "group",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "group" => Ok(Visibility::Group),
            _ => Err(format!("unknown visibility: {}", s)),
        }
    }
}

/// A trackable goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Title shown to subscribers
    pub title: String,
    /// Secondary line shown under the title
    pub subtitle: String,
    /// Target repetition count; always >= 1
    pub goal_value: i64,
    /// Maximum number of subscriptions allowed
    pub max_subscribers: i64,
    /// Six-digit code for joining by invitation
    pub join_code: String,
    /// Discovery scope
    pub visibility: Visibility,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// User id of the creator
    pub created_by: String,
}

impl Event {
    /// Create a new event with a generated id and join code.
    pub fn new(
        title: &str,
        subtitle: &str,
        goal_value: i64,
        max_subscribers: i64,
        visibility: Visibility,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id: id.to_string(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            goal_value: goal_value.max(1),
            max_subscribers,
            join_code: derive_join_code(&id),
            visibility,
            created_at,
            created_by: created_by.to_string(),
        }
    }
}

/// Derive a six-digit join code from an event id.
fn derive_join_code(id: &Uuid) -> String {
    let n = id.as_u128() % 900_000 + 100_000;
    n.to_string()
}

// ============================================
// Subscription
// ============================================

/// A user's enrollment in an event.
///
/// `current_sum` mirrors the most recent cumulative sum observed among the
/// subscription's logs. It is written as a side effect of log insertion and
/// is eventually consistent; `Database::reconcile_subscription_sums` repairs
/// any drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Subscribing user
    pub user_id: String,
    /// Subscribed event
    pub event_id: String,
    /// When the subscription started
    pub started_at: DateTime<Utc>,
    /// Latest observed cumulative log sum
    pub current_sum: i64,
}

// ============================================
// LogEntry
// ============================================

/// One recorded repetition.
///
/// Append-only: the analytics core never mutates or deletes log entries.
/// `cumulative_sum` is assigned at insertion and is monotonically
/// non-decreasing per (user, event) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Logging user
    pub user_id: String,
    /// Event the repetition counts toward
    pub event_id: String,
    /// When the repetition was logged
    pub timestamp: DateTime<Utc>,
    /// Running total for this (user, event) pair at insertion time
    pub cumulative_sum: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_visibility_round_trip() {
        for v in [Visibility::Public, Visibility::Private, Visibility::Group] {
            assert_eq!(Visibility::from_str(v.as_str()), Ok(v));
        }
        assert!(Visibility::from_str("secret").is_err());
    }

    #[test]
    fn test_event_join_code_is_six_digits() {
        let event = Event::new("Gayatri", "108 daily", 10000, 50, Visibility::Public, "u1", Utc::now());
        assert_eq!(event.join_code.len(), 6);
        assert!(event.join_code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_event_goal_clamped_to_one() {
        let event = Event::new("t", "s", 0, 10, Visibility::Private, "u1", Utc::now());
        assert_eq!(event.goal_value, 1);
    }
}
