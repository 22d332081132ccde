//! Database migrations
//!
//! Schema: settings, trackers (one row per observed tracker/site pair),
//! enforcement (absent row means no enforcement, auto origin).

use crate::Result;
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<i32, _> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        });

    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(rusqlite::Error::SqliteFailure(_, _)) => {
            // Table doesn't exist yet
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
                [],
            )?;
            conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1: Initial schema");

    // Settings table - auto_block_threshold and friends
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
    )?;

    // Tracking ledger: one row per observed (tracker, site) pair.
    // Presence is what matters, not counts.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS trackers (
            tracker TEXT NOT NULL,
            site TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (tracker, site)
        );

        CREATE INDEX IF NOT EXISTS idx_trackers_tracker ON trackers(tracker);
    "#,
    )?;

    // Per-tracker enforcement. A missing row means None/auto.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS enforcement (
            domain TEXT PRIMARY KEY,
            level TEXT NOT NULL,
            origin TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
    )?;

    Ok(())
}
