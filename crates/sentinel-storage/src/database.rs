//! Database connection and engine-facing operations
//!
//! All SQL for the tracking ledger and enforcement map lives here so the
//! engine crate never touches rusqlite directly.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

/// One persisted enforcement entry, level and origin as their string tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementRow {
    pub domain: String,
    pub level: String,
    pub origin: String,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    // === Settings ===

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
    }

    // === Tracking ledger ===

    /// Record one observed (tracker, site) pair. Idempotent.
    pub fn insert_observation(&self, tracker: &str, site: &str) -> Result<()> {
        let created_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO trackers (tracker, site, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![tracker, site, created_at],
            )?;
            Ok(())
        })
    }

    /// Load the full ledger as tracker -> set of sites.
    pub fn load_tracker_map(&self) -> Result<HashMap<String, HashSet<String>>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT tracker, site FROM trackers")?;
            let mut map: HashMap<String, HashSet<String>> = HashMap::new();

            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (tracker, site) = row?;
                map.entry(tracker).or_default().insert(site);
            }

            Ok(map)
        })
    }

    /// Replace the persisted ledger wholesale (shutdown pruning pass).
    pub fn replace_tracker_map(&self, map: &HashMap<String, HashSet<String>>) -> Result<()> {
        let created_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM trackers", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trackers (tracker, site, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for (tracker, sites) in map {
                for site in sites {
                    stmt.execute(rusqlite::params![tracker, site, created_at])?;
                }
            }
        }
        tx.commit()?;

        Ok(())
    }

    // === Enforcement ===

    pub fn upsert_enforcement(&self, domain: &str, level: &str, origin: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO enforcement (domain, level, origin, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![domain, level, origin, updated_at],
            )?;
            Ok(())
        })
    }

    /// Absence of a row encodes the None/auto level.
    pub fn delete_enforcement(&self, domain: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM enforcement WHERE domain = ?1", [domain])?;
            Ok(())
        })
    }

    pub fn load_enforcement(&self) -> Result<Vec<EnforcementRow>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT domain, level, origin FROM enforcement")?;

            let rows: Vec<EnforcementRow> = stmt
                .query_map([], |row| {
                    Ok(EnforcementRow {
                        domain: row.get(0)?,
                        level: row.get(1)?,
                        origin: row.get(2)?,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(rows)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.get_setting("auto_block_threshold").unwrap(), None);
        db.set_setting("auto_block_threshold", "5").unwrap();
        assert_eq!(
            db.get_setting("auto_block_threshold").unwrap(),
            Some("5".to_string())
        );
    }

    #[test]
    fn test_observation_idempotent() {
        let db = Database::open_in_memory().unwrap();

        db.insert_observation("tracker.example", "news.example")
            .unwrap();
        db.insert_observation("tracker.example", "news.example")
            .unwrap();
        db.insert_observation("tracker.example", "shop.example")
            .unwrap();

        let map = db.load_tracker_map().unwrap();
        assert_eq!(map["tracker.example"].len(), 2);
    }

    #[test]
    fn test_replace_tracker_map() {
        let db = Database::open_in_memory().unwrap();

        db.insert_observation("a.example", "one.example").unwrap();
        db.insert_observation("b.example", "one.example").unwrap();

        let mut pruned: HashMap<String, HashSet<String>> = HashMap::new();
        pruned.insert(
            "a.example".to_string(),
            ["one.example".to_string(), "two.example".to_string()]
                .into_iter()
                .collect(),
        );
        db.replace_tracker_map(&pruned).unwrap();

        let map = db.load_tracker_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["a.example"].len(), 2);
    }

    #[test]
    fn test_enforcement_rows() {
        let db = Database::open_in_memory().unwrap();

        db.upsert_enforcement("tracker.example", "cookie", "auto")
            .unwrap();
        db.upsert_enforcement("tracker.example", "connection", "auto")
            .unwrap();

        let rows = db.load_enforcement().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, "connection");

        db.delete_enforcement("tracker.example").unwrap();
        assert!(db.load_enforcement().unwrap().is_empty());
    }
}
