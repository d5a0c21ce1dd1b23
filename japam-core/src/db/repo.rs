//! Database repository layer
//!
//! Provides query and insert operations for all entity types, plus the
//! bucketing and histogram queries the analytics modules consume.

use crate::analytics::buckets::DailyBucket;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Entity counts over a half-open time window, one row of the nightly
/// admin snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityCounts {
    pub new_users: i64,
    pub tombstoned_users: i64,
    pub new_events: i64,
    pub new_subscriptions: i64,
    pub new_logs: i64,
}

/// Log count for one (user, event) pair over a time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCount {
    pub user_id: String,
    pub event_id: String,
    pub count: i64,
}

/// One persisted nightly metrics row.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// UTC day the snapshot window ended on
    pub snapshot_date: NaiveDate,
    /// 'admin' or 'subscription'
    pub scope: String,
    pub user_id: Option<String>,
    pub event_id: Option<String>,
    pub payload: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // User operations
    // ============================================

    /// Insert a user
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO users (id, name, email, created_at, tombstoned_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user.id,
                user.name,
                user.email,
                user.created_at.to_rfc3339(),
                user.tombstoned_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM users WHERE id = ?", [id], Self::row_to_user)
            .optional()
            .map_err(Error::from)
    }

    /// Soft-delete a user. The account and its logs stay in place; only the
    /// tombstone timestamp is set, so the nightly snapshot can count it.
    pub fn tombstone_user(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET tombstoned_at = ?1 WHERE id = ?2 AND tombstoned_at IS NULL",
            params![at.to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(Error::UserNotFound(id.to_string()));
        }
        Ok(())
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let created_at: String = row.get("created_at")?;
        let tombstoned_at: Option<String> = row.get("tombstoned_at")?;
        Ok(User {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            created_at: parse_ts(&created_at),
            tombstoned_at: tombstoned_at.as_deref().map(parse_ts),
        })
    }

    // ============================================
    // Event operations
    // ============================================

    /// Insert an event
    pub fn insert_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO events (id, title, subtitle, goal_value, max_subscribers,
                                join_code, visibility, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                event.id,
                event.title,
                event.subtitle,
                event.goal_value,
                event.max_subscribers,
                event.join_code,
                event.visibility.as_str(),
                event.created_at.to_rfc3339(),
                event.created_by,
            ],
        )?;
        Ok(())
    }

    /// Get an event by ID
    pub fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM events WHERE id = ?", [id], Self::row_to_event)
            .optional()
            .map_err(Error::from)
    }

    /// Get an event by its six-digit join code
    pub fn get_event_by_join_code(&self, join_code: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM events WHERE join_code = ?",
            [join_code],
            Self::row_to_event,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
        let created_at: String = row.get("created_at")?;
        let visibility: String = row.get("visibility")?;
        Ok(Event {
            id: row.get("id")?,
            title: row.get("title")?,
            subtitle: row.get("subtitle")?,
            goal_value: row.get("goal_value")?,
            max_subscribers: row.get("max_subscribers")?,
            join_code: row.get("join_code")?,
            visibility: visibility.parse().unwrap_or(Visibility::Private),
            created_at: parse_ts(&created_at),
            created_by: row.get("created_by")?,
        })
    }

    // ============================================
    // Subscription operations
    // ============================================

    /// Subscribe a user to an event.
    ///
    /// Fails when the user or event does not exist, the pair is already
    /// subscribed, or the event is at its subscriber cap.
    pub fn subscribe(
        &self,
        user_id: &str,
        event_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Subscription> {
        let conn = self.conn.lock().unwrap();

        let user_exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?",
            [user_id],
            |r| r.get(0),
        )?;
        if user_exists == 0 {
            return Err(Error::UserNotFound(user_id.to_string()));
        }

        let max_subscribers: i64 = conn
            .query_row(
                "SELECT max_subscribers FROM events WHERE id = ?",
                [event_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::EventNotFound(event_id.to_string()))?;

        let duplicate: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND event_id = ?2",
            params![user_id, event_id],
            |r| r.get(0),
        )?;
        if duplicate > 0 {
            return Err(Error::SubscriptionExists {
                user_id: user_id.to_string(),
                event_id: event_id.to_string(),
            });
        }

        let subscribed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE event_id = ?",
            [event_id],
            |r| r.get(0),
        )?;
        if subscribed >= max_subscribers {
            return Err(Error::EventFull(event_id.to_string()));
        }

        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            started_at,
            current_sum: 0,
        };
        conn.execute(
            r#"
            INSERT INTO subscriptions (id, user_id, event_id, started_at, current_sum)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
            params![
                subscription.id,
                subscription.user_id,
                subscription.event_id,
                subscription.started_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!(user_id, event_id, "Created subscription");
        Ok(subscription)
    }

    /// Get a subscription by ID
    pub fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM subscriptions WHERE id = ?",
            [id],
            Self::row_to_subscription,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get the subscription for a (user, event) pair
    pub fn get_subscription_for(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> Result<Option<Subscription>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM subscriptions WHERE user_id = ?1 AND event_id = ?2",
            params![user_id, event_id],
            Self::row_to_subscription,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List a user's subscriptions with their events, oldest first
    pub fn list_subscriptions_with_events(
        &self,
        user_id: &str,
    ) -> Result<Vec<(Subscription, Event)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT s.id, s.user_id, s.event_id, s.started_at, s.current_sum,
                   e.id, e.title, e.subtitle, e.goal_value, e.max_subscribers,
                   e.join_code, e.visibility, e.created_at, e.created_by
            FROM subscriptions s
            JOIN events e ON s.event_id = e.id
            WHERE s.user_id = ?
            ORDER BY s.started_at ASC
            "#,
        )?;
        let rows = stmt.query_map([user_id], |row| {
            let started_at: String = row.get(3)?;
            let event_created: String = row.get(12)?;
            let visibility: String = row.get(11)?;
            Ok((
                Subscription {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    event_id: row.get(2)?,
                    started_at: parse_ts(&started_at),
                    current_sum: row.get(4)?,
                },
                Event {
                    id: row.get(5)?,
                    title: row.get(6)?,
                    subtitle: row.get(7)?,
                    goal_value: row.get(8)?,
                    max_subscribers: row.get(9)?,
                    join_code: row.get(10)?,
                    visibility: visibility.parse().unwrap_or(Visibility::Private),
                    created_at: parse_ts(&event_created),
                    created_by: row.get(13)?,
                },
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    fn row_to_subscription(row: &Row) -> rusqlite::Result<Subscription> {
        let started_at: String = row.get("started_at")?;
        Ok(Subscription {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            event_id: row.get("event_id")?,
            started_at: parse_ts(&started_at),
            current_sum: row.get("current_sum")?,
        })
    }

    // ============================================
    // Log operations
    // ============================================

    /// Append one repetition for a (user, event) pair.
    ///
    /// Runs in a transaction: the cumulative sum continues from the highest
    /// sum already logged for the pair, and the subscription's mirrored
    /// `current_sum` is updated in the same step. Requires an existing
    /// subscription.
    pub fn append_log(
        &self,
        user_id: &str,
        event_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LogEntry> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let subscribed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND event_id = ?2",
            params![user_id, event_id],
            |r| r.get(0),
        )?;
        if subscribed == 0 {
            return Err(Error::NotSubscribed {
                user_id: user_id.to_string(),
                event_id: event_id.to_string(),
            });
        }

        let prev_sum: i64 = tx.query_row(
            "SELECT COALESCE(MAX(cumulative_sum), 0) FROM logs WHERE user_id = ?1 AND event_id = ?2",
            params![user_id, event_id],
            |r| r.get(0),
        )?;

        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            timestamp,
            cumulative_sum: prev_sum + 1,
        };
        tx.execute(
            r#"
            INSERT INTO logs (id, user_id, event_id, timestamp, cumulative_sum)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.id,
                entry.user_id,
                entry.event_id,
                entry.timestamp.to_rfc3339(),
                entry.cumulative_sum,
            ],
        )?;
        tx.execute(
            "UPDATE subscriptions SET current_sum = ?1 WHERE user_id = ?2 AND event_id = ?3",
            params![entry.cumulative_sum, user_id, event_id],
        )?;

        tx.commit()?;
        Ok(entry)
    }

    /// Full log history for a pair, ascending by cumulative sum
    pub fn log_history(&self, user_id: &str, event_id: &str) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, event_id, timestamp, cumulative_sum
            FROM logs
            WHERE user_id = ?1 AND event_id = ?2
            ORDER BY cumulative_sum ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, event_id], |row| {
            let timestamp: String = row.get(3)?;
            Ok(LogEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                event_id: row.get(2)?,
                timestamp: parse_ts(&timestamp),
                cumulative_sum: row.get(4)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // ============================================
    // Bucketing and histogram queries
    // ============================================

    /// Per-UTC-day log counts for a pair, ascending by date. Days with no
    /// activity are omitted.
    pub fn daily_counts(&self, user_id: &str, event_id: &str) -> Result<Vec<DailyBucket>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT date(timestamp) as day, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?1 AND event_id = ?2
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, event_id], |row| {
            let day: String = row.get(0)?;
            Ok((day, row.get::<_, i64>(1)?))
        })?;
        collect_daily(rows)
    }

    /// Like [`daily_counts`](Self::daily_counts) but bounded below
    pub fn daily_counts_since(
        &self,
        user_id: &str,
        event_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyBucket>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT date(timestamp) as day, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?1 AND event_id = ?2 AND timestamp >= ?3
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, event_id, since.to_rfc3339()], |row| {
            let day: String = row.get(0)?;
            Ok((day, row.get::<_, i64>(1)?))
        })?;
        collect_daily(rows)
    }

    /// Per-UTC-day log counts across all of a user's events, ascending
    pub fn user_daily_counts(&self, user_id: &str) -> Result<Vec<DailyBucket>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT date(timestamp) as day, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;
        let rows = stmt.query_map([user_id], |row| {
            let day: String = row.get(0)?;
            Ok((day, row.get::<_, i64>(1)?))
        })?;
        collect_daily(rows)
    }

    /// Like [`user_daily_counts`](Self::user_daily_counts) but bounded below
    pub fn user_daily_counts_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyBucket>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT date(timestamp) as day, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?1 AND timestamp >= ?2
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, since.to_rfc3339()], |row| {
            let day: String = row.get(0)?;
            Ok((day, row.get::<_, i64>(1)?))
        })?;
        collect_daily(rows)
    }

    /// Total log count per event for one user
    pub fn log_counts_by_event(&self, user_id: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?
            GROUP BY event_id
            ORDER BY event_id
            "#,
        )?;
        let rows = stmt.query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Hourly log distribution for a pair (UTC hours, dense 24 slots)
    pub fn hourly_distribution(&self, user_id: &str, event_id: &str) -> Result<[i64; 24]> {
        let conn = self.conn.lock().unwrap();
        let mut distribution = [0i64; 24];

        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(strftime('%H', timestamp) AS INTEGER) as hour, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?1 AND event_id = ?2
            GROUP BY hour
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, event_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows.flatten() {
            let (hour, count) = row;
            if (0..24).contains(&hour) {
                distribution[hour as usize] = count;
            }
        }

        Ok(distribution)
    }

    /// Day-of-week log distribution for a pair (0=Sunday, dense 7 slots)
    pub fn day_of_week_distribution(&self, user_id: &str, event_id: &str) -> Result<[i64; 7]> {
        let conn = self.conn.lock().unwrap();
        let mut distribution = [0i64; 7];

        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(strftime('%w', timestamp) AS INTEGER) as dow, COUNT(*) as cnt
            FROM logs
            WHERE user_id = ?1 AND event_id = ?2
            GROUP BY dow
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, event_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows.flatten() {
            let (dow, count) = row;
            if (0..7).contains(&dow) {
                distribution[dow as usize] = count;
            }
        }

        Ok(distribution)
    }

    // ============================================
    // Reconciliation
    // ============================================

    /// Repair drifted subscription sums from the log table.
    ///
    /// Sets every subscription's `current_sum` to the highest cumulative sum
    /// among its logs (0 when there are none). Idempotent; returns the
    /// number of rows that actually changed.
    pub fn reconcile_subscription_sums(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            UPDATE subscriptions
            SET current_sum = (
                SELECT COALESCE(MAX(l.cumulative_sum), 0)
                FROM logs l
                WHERE l.user_id = subscriptions.user_id
                  AND l.event_id = subscriptions.event_id
            )
            WHERE current_sum != (
                SELECT COALESCE(MAX(l.cumulative_sum), 0)
                FROM logs l
                WHERE l.user_id = subscriptions.user_id
                  AND l.event_id = subscriptions.event_id
            )
            "#,
            [],
        )?;
        if changed > 0 {
            tracing::info!(changed, "Reconciled drifted subscription sums");
        }
        Ok(changed)
    }

    // ============================================
    // Growth and snapshot queries
    // ============================================

    /// Total row count and count at-or-after `from` for each entity.
    /// Returns (users, events, subscriptions, logs) as (total, since) pairs.
    pub fn growth_counts(&self, from: DateTime<Utc>) -> Result<[(i64, i64); 4]> {
        let conn = self.conn.lock().unwrap();
        let from_str = from.to_rfc3339();
        let mut out = [(0i64, 0i64); 4];
        let queries = [
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN created_at >= ?1 THEN 1 ELSE 0 END), 0) FROM users",
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN created_at >= ?1 THEN 1 ELSE 0 END), 0) FROM events",
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN started_at >= ?1 THEN 1 ELSE 0 END), 0) FROM subscriptions",
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN timestamp >= ?1 THEN 1 ELSE 0 END), 0) FROM logs",
        ];
        for (slot, sql) in out.iter_mut().zip(queries) {
            *slot = conn.query_row(sql, [&from_str], |r| Ok((r.get(0)?, r.get(1)?)))?;
        }
        Ok(out)
    }

    /// Entity counts over a half-open window `[lower, upper)`
    pub fn entity_counts_between(
        &self,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<EntityCounts> {
        let conn = self.conn.lock().unwrap();
        let lo = lower.to_rfc3339();
        let hi = upper.to_rfc3339();

        let count = |sql: &str| -> Result<i64> {
            conn.query_row(sql, params![lo, hi], |r| r.get(0))
                .map_err(Error::from)
        };

        Ok(EntityCounts {
            new_users: count(
                "SELECT COUNT(*) FROM users WHERE created_at >= ?1 AND created_at < ?2",
            )?,
            tombstoned_users: count(
                "SELECT COUNT(*) FROM users WHERE tombstoned_at >= ?1 AND tombstoned_at < ?2",
            )?,
            new_events: count(
                "SELECT COUNT(*) FROM events WHERE created_at >= ?1 AND created_at < ?2",
            )?,
            new_subscriptions: count(
                "SELECT COUNT(*) FROM subscriptions WHERE started_at >= ?1 AND started_at < ?2",
            )?,
            new_logs: count(
                "SELECT COUNT(*) FROM logs WHERE timestamp >= ?1 AND timestamp < ?2",
            )?,
        })
    }

    /// Per-(user, event) log counts over a half-open window `[lower, upper)`
    pub fn log_counts_between(
        &self,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Result<Vec<PairCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, event_id, COUNT(*) as cnt
            FROM logs
            WHERE timestamp >= ?1 AND timestamp < ?2
            GROUP BY user_id, event_id
            ORDER BY user_id, event_id
            "#,
        )?;
        let rows = stmt.query_map(params![lower.to_rfc3339(), upper.to_rfc3339()], |row| {
            Ok(PairCount {
                user_id: row.get(0)?,
                event_id: row.get(1)?,
                count: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Insert or replace a nightly metrics row (reruns are idempotent)
    pub fn upsert_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO metrics_snapshots
                (snapshot_date, scope, user_id, event_id, payload, computed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(snapshot_date, scope, user_id, event_id) DO UPDATE SET
                payload = excluded.payload,
                computed_at = excluded.computed_at
            "#,
            params![
                snapshot.snapshot_date.to_string(),
                snapshot.scope,
                snapshot.user_id.clone().unwrap_or_default(),
                snapshot.event_id.clone().unwrap_or_default(),
                snapshot.payload.to_string(),
                snapshot.computed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List the metrics rows for one snapshot day
    pub fn metrics_snapshots_for(&self, date: NaiveDate) -> Result<Vec<MetricsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT snapshot_date, scope, user_id, event_id, payload, computed_at
            FROM metrics_snapshots
            WHERE snapshot_date = ?
            ORDER BY scope, user_id, event_id
            "#,
        )?;
        let rows = stmt.query_map([date.to_string()], |row| {
            let snapshot_date: String = row.get(0)?;
            let user_id: String = row.get(2)?;
            let event_id: String = row.get(3)?;
            let payload: String = row.get(4)?;
            let computed_at: String = row.get(5)?;
            Ok(MetricsSnapshot {
                snapshot_date: snapshot_date.parse().unwrap_or(NaiveDate::MIN),
                scope: row.get(1)?,
                user_id: (!user_id.is_empty()).then_some(user_id),
                event_id: (!event_id.is_empty()).then_some(event_id),
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::json!({})),
                computed_at: parse_ts(&computed_at),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }
}

/// Parse an RFC 3339 timestamp column, defaulting to now on malformed data
fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn collect_daily(
    rows: impl Iterator<Item = rusqlite::Result<(String, i64)>>,
) -> Result<Vec<DailyBucket>> {
    let mut out = Vec::new();
    for row in rows {
        let (day, count) = row?;
        out.push(DailyBucket {
            date: day.parse().unwrap_or(NaiveDate::MIN),
            count,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn seed_pair(db: &Database) -> (User, Event) {
        let user = User::new("Asha", "asha@example.com", ts("2026-08-01T00:00:00Z"));
        db.insert_user(&user).unwrap();
        let event = Event::new(
            "Gayatri Japa",
            "108 daily",
            10_000,
            50,
            Visibility::Public,
            &user.id,
            ts("2026-08-01T00:00:00Z"),
        );
        db.insert_event(&event).unwrap();
        (user, event)
    }

    #[test]
    fn test_user_round_trip_and_tombstone() {
        let db = test_db();
        let user = User::new("Asha", "asha@example.com", ts("2026-08-01T00:00:00Z"));
        db.insert_user(&user).unwrap();

        let loaded = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Asha");
        assert!(loaded.tombstoned_at.is_none());

        db.tombstone_user(&user.id, ts("2026-08-10T00:00:00Z")).unwrap();
        let loaded = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(loaded.tombstoned_at, Some(ts("2026-08-10T00:00:00Z")));

        // Second tombstone and unknown id both fail
        assert!(db.tombstone_user(&user.id, Utc::now()).is_err());
        assert!(matches!(
            db.tombstone_user("nope", Utc::now()),
            Err(Error::UserNotFound(_))
        ));
    }

    #[test]
    fn test_event_lookup_by_join_code() {
        let db = test_db();
        let (_, event) = seed_pair(&db);
        let found = db.get_event_by_join_code(&event.join_code).unwrap().unwrap();
        assert_eq!(found.id, event.id);
        assert!(db.get_event_by_join_code("000000").unwrap().is_none());
    }

    #[test]
    fn test_subscribe_rules() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        let started = ts("2026-08-02T00:00:00Z");

        db.subscribe(&user.id, &event.id, started).unwrap();

        assert!(matches!(
            db.subscribe(&user.id, &event.id, started),
            Err(Error::SubscriptionExists { .. })
        ));
        assert!(matches!(
            db.subscribe("ghost", &event.id, started),
            Err(Error::UserNotFound(_))
        ));
        assert!(matches!(
            db.subscribe(&user.id, "ghost", started),
            Err(Error::EventNotFound(_))
        ));
    }

    #[test]
    fn test_subscribe_capacity() {
        let db = test_db();
        let creator = User::new("c", "c@example.com", ts("2026-08-01T00:00:00Z"));
        db.insert_user(&creator).unwrap();
        let event = Event::new(
            "Small",
            "",
            100,
            1,
            Visibility::Private,
            &creator.id,
            ts("2026-08-01T00:00:00Z"),
        );
        db.insert_event(&event).unwrap();

        db.subscribe(&creator.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();

        let second = User::new("d", "d@example.com", ts("2026-08-01T00:00:00Z"));
        db.insert_user(&second).unwrap();
        assert!(matches!(
            db.subscribe(&second.id, &event.id, ts("2026-08-03T00:00:00Z")),
            Err(Error::EventFull(_))
        ));
    }

    #[test]
    fn test_append_log_assigns_monotonic_sums() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        db.subscribe(&user.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();

        let first = db.append_log(&user.id, &event.id, ts("2026-08-02T06:00:00Z")).unwrap();
        let second = db.append_log(&user.id, &event.id, ts("2026-08-02T07:00:00Z")).unwrap();
        assert_eq!(first.cumulative_sum, 1);
        assert_eq!(second.cumulative_sum, 2);

        let sub = db.get_subscription_for(&user.id, &event.id).unwrap().unwrap();
        assert_eq!(sub.current_sum, 2);
    }

    #[test]
    fn test_append_log_requires_subscription() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        assert!(matches!(
            db.append_log(&user.id, &event.id, Utc::now()),
            Err(Error::NotSubscribed { .. })
        ));
    }

    #[test]
    fn test_daily_counts_group_by_utc_day() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        db.subscribe(&user.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();

        // Two on the 2nd (one just before midnight), one on the 3rd
        db.append_log(&user.id, &event.id, ts("2026-08-02T06:00:00Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-02T23:59:59Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-03T00:00:01Z")).unwrap();

        let days = db.daily_counts(&user.id, &event.id).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2026-08-02".parse().unwrap());
        assert_eq!(days[0].count, 2);
        assert_eq!(days[1].count, 1);

        let since = db
            .daily_counts_since(&user.id, &event.id, ts("2026-08-03T00:00:00Z"))
            .unwrap();
        assert_eq!(since.len(), 1);
    }

    #[test]
    fn test_distributions() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        db.subscribe(&user.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();

        // 2026-08-02 is a Sunday; 06:00 UTC
        db.append_log(&user.id, &event.id, ts("2026-08-02T06:00:00Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-02T06:30:00Z")).unwrap();
        // 2026-08-03 is a Monday; 18:00 UTC
        db.append_log(&user.id, &event.id, ts("2026-08-03T18:00:00Z")).unwrap();

        let hours = db.hourly_distribution(&user.id, &event.id).unwrap();
        assert_eq!(hours[6], 2);
        assert_eq!(hours[18], 1);

        let dows = db.day_of_week_distribution(&user.id, &event.id).unwrap();
        assert_eq!(dows[0], 2); // Sunday
        assert_eq!(dows[1], 1); // Monday
    }

    #[test]
    fn test_reconcile_repairs_drift() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        db.subscribe(&user.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-02T06:00:00Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-03T06:00:00Z")).unwrap();

        // Skew the mirrored sum behind the log table
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE subscriptions SET current_sum = 0", []).unwrap();
        }

        assert_eq!(db.reconcile_subscription_sums().unwrap(), 1);
        let sub = db.get_subscription_for(&user.id, &event.id).unwrap().unwrap();
        assert_eq!(sub.current_sum, 2);

        // Second pass is a no-op
        assert_eq!(db.reconcile_subscription_sums().unwrap(), 0);
    }

    #[test]
    fn test_entity_counts_between_window_is_half_open() {
        let db = test_db();
        let (user, event) = seed_pair(&db);
        db.subscribe(&user.id, &event.id, ts("2026-08-02T00:00:00Z")).unwrap();
        db.append_log(&user.id, &event.id, ts("2026-08-02T06:00:00Z")).unwrap();

        let counts = db
            .entity_counts_between(ts("2026-08-02T00:00:00Z"), ts("2026-08-03T00:00:00Z"))
            .unwrap();
        assert_eq!(counts.new_subscriptions, 1);
        assert_eq!(counts.new_logs, 1);
        assert_eq!(counts.new_users, 0); // created on the 1st

        let pairs = db
            .log_counts_between(ts("2026-08-02T00:00:00Z"), ts("2026-08-03T00:00:00Z"))
            .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].count, 1);
    }

    #[test]
    fn test_metrics_snapshot_upsert_is_idempotent() {
        let db = test_db();
        let mut snapshot = MetricsSnapshot {
            snapshot_date: "2026-08-24".parse().unwrap(),
            scope: "admin".to_string(),
            user_id: None,
            event_id: None,
            payload: serde_json::json!({"newLogs": 3}),
            computed_at: ts("2026-08-25T02:00:00Z"),
        };
        db.upsert_metrics_snapshot(&snapshot).unwrap();

        snapshot.payload = serde_json::json!({"newLogs": 4});
        db.upsert_metrics_snapshot(&snapshot).unwrap();

        let rows = db.metrics_snapshots_for("2026-08-24".parse().unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload["newLogs"], 4);
    }
}
