//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Core entities
    r#"
    -- ============================================
    -- Canonical entities
    -- ============================================

    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        email            TEXT NOT NULL,
        created_at       DATETIME NOT NULL,
        tombstoned_at    DATETIME
    );

    CREATE TABLE IF NOT EXISTS events (
        id               TEXT PRIMARY KEY,
        title            TEXT NOT NULL,
        subtitle         TEXT NOT NULL DEFAULT '',
        goal_value       INTEGER NOT NULL,
        max_subscribers  INTEGER NOT NULL,
        join_code        TEXT NOT NULL,
        visibility       TEXT NOT NULL,      -- 'public', 'private', 'group'
        created_at       DATETIME NOT NULL,
        created_by       TEXT NOT NULL REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS subscriptions (
        id               TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL REFERENCES users(id),
        event_id         TEXT NOT NULL REFERENCES events(id),
        started_at       DATETIME NOT NULL,
        current_sum      INTEGER NOT NULL DEFAULT 0,

        UNIQUE(user_id, event_id)
    );

    -- Append-only; cumulative_sum is assigned at insert and never rewritten
    CREATE TABLE IF NOT EXISTS logs (
        id               TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL REFERENCES users(id),
        event_id         TEXT NOT NULL REFERENCES events(id),
        timestamp        DATETIME NOT NULL,
        cumulative_sum   INTEGER NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    CREATE UNIQUE INDEX IF NOT EXISTS idx_events_join_code ON events(join_code);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_event ON subscriptions(event_id);
    CREATE INDEX IF NOT EXISTS idx_logs_user_event ON logs(user_id, event_id);
    CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
    "#,
    // Version 2: Derived nightly metrics snapshots
    r#"
    CREATE TABLE IF NOT EXISTS metrics_snapshots (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        snapshot_date    TEXT NOT NULL,      -- UTC day the window ended on
        scope            TEXT NOT NULL,      -- 'admin' or 'subscription'
        -- Empty rather than NULL so the unique index dedupes admin rows
        user_id          TEXT NOT NULL DEFAULT '',
        event_id         TEXT NOT NULL DEFAULT '',
        payload          JSON NOT NULL,
        computed_at      DATETIME NOT NULL,

        UNIQUE(snapshot_date, scope, user_id, event_id)
    );

    CREATE INDEX IF NOT EXISTS idx_metrics_snapshots_date ON metrics_snapshots(snapshot_date);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
