// Database schema: table creation and migrations.
//
// A `schema_version` table tracks which migrations have run, and each
// migration is a function that executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, called on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per recorded analysis
        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            prediction TEXT NOT NULL,          -- 'Real' or 'Fake'
            confidence REAL NOT NULL,
            fake_probability REAL NOT NULL,
            real_probability REAL NOT NULL,
            suspicion_score REAL NOT NULL,
            pipeline_score REAL NOT NULL,
            token_diversity REAL,              -- null without token features
            text_length INTEGER,
            method TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Running totals (singleton row)
        CREATE TABLE IF NOT EXISTS system_stats (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            total_analyses INTEGER NOT NULL DEFAULT 0,
            fake_detected INTEGER NOT NULL DEFAULT 0,
            real_detected INTEGER NOT NULL DEFAULT 0,
            last_updated TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_analyses_created
            ON analyses(created_at);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;
    conn.execute("INSERT OR IGNORE INTO system_stats (id) VALUES (1)", [])?;

    // Migration v2: record which entry point produced each analysis.
    run_migration(conn, 2, |c| {
        c.execute_batch("ALTER TABLE analyses ADD COLUMN source TEXT NOT NULL DEFAULT 'cli';")
    })?;

    // Migration v3: caller address for analyses submitted over HTTP.
    run_migration(conn, 3, |c| {
        c.execute_batch("ALTER TABLE analyses ADD COLUMN ip_address TEXT;")
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
