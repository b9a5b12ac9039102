//! SQLite storage for devices and results
//!
//! Two tables: `devices` (caller-supplied id, server-assigned display name)
//! and `results` (append-only run records). A single connection behind a
//! mutex serializes access; schema migration is idempotent and runs at open.

use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// One ranked/recorded run joined with the submitting device's display name.
///
/// Field names serialize in camelCase to match the dashboard contract.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub id: i64,
    pub display_name: String,
    pub map_name: String,
    pub clear_time: f64,
    pub jump_count: i64,
    pub created_at: i64,
}

/// An incoming run submission. Clear time and jump count are caller-supplied
/// and stored without range validation.
#[derive(Debug, Clone)]
pub struct Submission {
    pub device_id: String,
    pub map_name: String,
    pub clear_time: f64,
    pub jump_count: i64,
}

const ENTRY_SELECT: &str = "SELECT r.id, d.display_name, r.map_name, r.clear_time, \
     r.jump_count, r.created_at \
     FROM results r INNER JOIN devices d ON r.device_id = d.id";

/// Shared handle to the leaderboard database
#[derive(Clone)]
pub struct GameStore {
    conn: Arc<Mutex<Connection>>,
}

impl GameStore {
    /// Open (or create) the database at `db_path` and run schema migration.
    ///
    /// Enables WAL journaling and foreign-key enforcement; the migration
    /// uses IF NOT EXISTS clauses throughout so reopening is a no-op.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id            TEXT PRIMARY KEY,
                display_name  TEXT NOT NULL,
                created_at    INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS results (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id     TEXT NOT NULL REFERENCES devices(id),
                map_name      TEXT NOT NULL,
                clear_time    REAL NOT NULL,
                jump_count    INTEGER NOT NULL,
                created_at    INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_map_time
                ON results(map_name, clear_time);
            CREATE INDEX IF NOT EXISTS idx_results_created
                ON results(created_at);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Record a run, registering the device on first contact.
    ///
    /// Registration assigns the next sequential `PC<N>` display name with an
    /// atomic INSERT OR IGNORE inside a transaction, so concurrent first
    /// submissions from one device can never create duplicate rows (a lost
    /// race at worst skips a sequence number). The result insert happens
    /// after the registration transaction commits; a failure there leaves an
    /// orphan device, which is idempotent and harmless.
    pub fn submit_result_at(
        &self,
        submission: &Submission,
        created_at: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();

        let tx = conn.transaction()?;
        let next_num: i64 = tx.query_row("SELECT COUNT(*) + 1 FROM devices", [], |row| row.get(0))?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO devices (id, display_name, created_at) VALUES (?1, ?2, ?3)",
            params![submission.device_id, format!("PC{}", next_num), created_at],
        )?;
        tx.commit()?;

        if inserted > 0 {
            log::info!(
                "🆕 Registered device {} as PC{}",
                submission.device_id,
                next_num
            );
        }

        conn.execute(
            "INSERT INTO results (device_id, map_name, clear_time, jump_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                submission.device_id,
                submission.map_name,
                submission.clear_time,
                submission.jump_count,
                created_at
            ],
        )?;

        Ok(())
    }

    /// Record a run stamped with the current time
    pub fn submit_result(&self, submission: &Submission) -> Result<(), StoreError> {
        self.submit_result_at(submission, chrono::Utc::now().timestamp())
    }

    /// Best `per_map_limit` runs per map, ascending by clear time
    /// (ties broken by insertion order), keyed by map name.
    pub fn ranking(
        &self,
        per_map_limit: u32,
    ) -> Result<BTreeMap<String, Vec<RankingEntry>>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut ranking = BTreeMap::new();

        for map_name in distinct_maps(&conn)? {
            let mut stmt = conn.prepare(&format!(
                "{ENTRY_SELECT}
                 WHERE r.map_name = ?1
                 ORDER BY r.clear_time ASC, r.id ASC
                 LIMIT ?2"
            ))?;
            let entries = stmt
                .query_map(params![map_name, per_map_limit], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            ranking.insert(map_name, entries);
        }

        Ok(ranking)
    }

    /// One page of a map's ranking, starting at `offset` within the
    /// ascending-clear-time ordering.
    pub fn ranking_page(
        &self,
        map_name: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RankingEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE r.map_name = ?1
             ORDER BY r.clear_time ASC, r.id ASC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let entries = stmt
            .query_map(params![map_name, limit, offset], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Most recent `limit` runs across all maps, newest first
    pub fn history(&self, limit: u32) -> Result<Vec<RankingEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{ENTRY_SELECT}
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map(params![limit], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn total_plays(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn device_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Creation timestamps of all results newer than `cutoff`, ascending
    pub fn result_timestamps_since(&self, cutoff: i64) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT created_at FROM results WHERE created_at > ?1 ORDER BY created_at ASC",
        )?;
        let timestamps = stmt
            .query_map(params![cutoff], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(timestamps)
    }

    /// Distinct map names, ascending
    pub fn map_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        distinct_maps(&conn)
    }

    /// All recorded clear times for one map, unordered
    pub fn clear_times_for_map(&self, map_name: &str) -> Result<Vec<f64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT clear_time FROM results WHERE map_name = ?1")?;
        let times = stmt
            .query_map(params![map_name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(times)
    }
}

fn distinct_maps(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT DISTINCT map_name FROM results ORDER BY map_name ASC")?;
    let maps = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(maps)
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RankingEntry> {
    Ok(RankingEntry {
        id: row.get(0)?,
        display_name: row.get(1)?,
        map_name: row.get(2)?,
        clear_time: row.get(3)?,
        jump_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}
