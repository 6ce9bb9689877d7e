//! SQLite-backed counter repository
//!
//! Layout:
//!
//! ```text
//! counter(id INTEGER PRIMARY KEY, value INTEGER NOT NULL)          -- one row, id = 1
//! counter_history(id INTEGER PRIMARY KEY AUTOINCREMENT,
//!                 who TEXT NOT NULL, value INTEGER NOT NULL,
//!                 createdUtc TEXT NOT NULL)
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::repository::{CounterRepository, RepositoryError, RepositoryResult};
use crate::types::{CounterSnapshot, HistoryAudit, HistoryEntry, ValueRange, COUNTER_ID};
use crate::utils::utc_now_rfc3339;

/// How long a connection waits for another writer before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter repository stored in a SQLite database
pub struct SqliteRepository {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        Self::configure(&conn)?;

        Ok(Self {
            path: Some(path),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;

        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Path of the database file, if it is file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Change how long a call blocks on another connection's write lock.
    ///
    /// Calls run on the caller's thread, so this is also the longest a
    /// contended call can stall it.
    pub fn set_busy_timeout(&self, timeout: Duration) -> RepositoryResult<()> {
        self.conn.lock().busy_timeout(timeout)?;
        Ok(())
    }

    fn configure(conn: &Connection) -> RepositoryResult<()> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;
        Ok(())
    }

    fn apply_increment_tx(
        tx: &Transaction<'_>,
        new_value: i64,
        expected: Option<i64>,
        actor: &str,
    ) -> RepositoryResult<HistoryEntry> {
        let changed = match expected {
            Some(expected) => tx.execute(
                "UPDATE counter SET value = ?1 WHERE id = ?2 AND value = ?3",
                params![new_value, COUNTER_ID, expected],
            )?,
            None => tx.execute(
                "UPDATE counter SET value = ?1 WHERE id = ?2",
                params![new_value, COUNTER_ID],
            )?,
        };

        if changed == 0 {
            let found = read_value_tx(tx)?;
            return Err(match (found, expected) {
                (Some(found), Some(expected)) => RepositoryError::Conflict { expected, found },
                _ => RepositoryError::MissingCounter(COUNTER_ID),
            });
        }

        // Stamped while the write lock is held, so time order matches id order
        let timestamp_utc = utc_now_rfc3339();
        tx.execute(
            "INSERT INTO counter_history(who, value, createdUtc) VALUES (?1, ?2, ?3)",
            params![actor, new_value, timestamp_utc],
        )?;
        let sequence_id = tx.last_insert_rowid();

        Ok(HistoryEntry::new(
            sequence_id,
            new_value,
            actor.to_string(),
            timestamp_utc,
        ))
    }
}

impl CounterRepository for SqliteRepository {
    fn bootstrap(&self) -> RepositoryResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS counter (
                id INTEGER PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS counter_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                who TEXT NOT NULL,
                value INTEGER NOT NULL,
                createdUtc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_counter_history_value
                ON counter_history(value);
            "#,
        )?;

        // Make sure the counter has exactly one row
        conn.execute(
            "INSERT INTO counter (id, value) SELECT ?1, 0 WHERE NOT EXISTS (SELECT 1 FROM counter WHERE id = ?1)",
            params![COUNTER_ID],
        )?;
        Ok(())
    }

    fn read_value(&self) -> RepositoryResult<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM counter WHERE id = ?1",
            params![COUNTER_ID],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(RepositoryError::MissingCounter(COUNTER_ID))
    }

    fn commit_increment(
        &self,
        new_value: i64,
        expected: Option<i64>,
        actor: &str,
    ) -> RepositoryResult<HistoryEntry> {
        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front so the update and the
        // append never interleave with another connection's writes
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match Self::apply_increment_tx(&tx, new_value, expected, actor) {
            Ok(entry) => {
                tx.commit()?;
                Ok(entry)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(
                        error = %rollback_err,
                        original = %e,
                        "Rollback of failed increment did not complete"
                    );
                }
                Err(e)
            }
        }
    }

    fn snapshot(&self, limit: Option<usize>) -> RepositoryResult<CounterSnapshot> {
        let mut conn = self.conn.lock();
        // One read transaction so the value and the history come from the same commit
        let tx = conn.transaction()?;

        let value = read_value_tx(&tx)?.ok_or(RepositoryError::MissingCounter(COUNTER_ID))?;

        // LIMIT -1 means no limit in SQLite
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1);
        let recent_history = {
            let mut stmt = tx.prepare(
                "SELECT id, value, who, createdUtc FROM counter_history ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(HistoryEntry {
                    sequence_id: row.get(0)?,
                    resulting_value: row.get(1)?,
                    actor: row.get(2)?,
                    timestamp_utc: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.commit()?;

        Ok(CounterSnapshot {
            value,
            recent_history,
        })
    }

    fn audit(&self) -> RepositoryResult<HistoryAudit> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let value = read_value_tx(&tx)?.ok_or(RepositoryError::MissingCounter(COUNTER_ID))?;

        let (entry_count, distinct_values): (i64, i64) = tx.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT value) FROM counter_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let duplicates = {
            let mut stmt = tx.prepare(
                "SELECT value FROM counter_history GROUP BY value HAVING COUNT(*) > 1 ORDER BY value",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()?
        };

        let gaps = {
            let mut stmt = tx.prepare(
                r#"
                SELECT prev + 1, value - 1 FROM (
                    SELECT value, LAG(value) OVER (ORDER BY value) AS prev
                    FROM (SELECT DISTINCT value FROM counter_history)
                )
                WHERE value > prev + 1
                ORDER BY value
                "#,
            )?;
            let rows = stmt.query_map([], |row| Ok(ValueRange::new(row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let last_value: Option<i64> = tx
            .query_row(
                "SELECT value FROM counter_history ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        tx.commit()?;

        Ok(HistoryAudit {
            value,
            entry_count: usize::try_from(entry_count).unwrap_or(0),
            distinct_values: usize::try_from(distinct_values).unwrap_or(0),
            duplicates,
            gaps,
            value_matches_last_entry: last_value.map_or(true, |last| last == value),
        })
    }
}

fn read_value_tx(tx: &Transaction<'_>) -> RepositoryResult<Option<i64>> {
    Ok(tx
        .query_row(
            "SELECT value FROM counter WHERE id = ?1",
            params![COUNTER_ID],
            |row| row.get(0),
        )
        .optional()?)
}
