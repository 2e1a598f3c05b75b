// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable queue.
//!
//! The [`QueueStore`] owns the `queue` and `dead_letters` tables. Every
//! mutation is a single statement or a single transaction, and the store is
//! used through one connection, so read-modify-write on an item is never
//! interleaved with another writer.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

use crate::clock::{ClockSource, SystemClock};
use crate::error::{Error, Result};
use crate::item::{DeadLetter, QueueItem, RetryOutcome, StoredOp};
use crate::op::ProgressOp;

/// Failed attempts after which an item is withdrawn from the retry path.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// SQL schema for the queue database.
pub const SCHEMA: &str = r#"
-- Pending and delivered operations; AUTOINCREMENT keeps ids from being reused
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_retry_at TEXT,
    last_error TEXT
);

-- Items that exhausted their retries or could not be decoded
CREATE TABLE IF NOT EXISTS dead_letters (
    id INTEGER PRIMARY KEY,      -- queue id at the time of withdrawal
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL,
    last_error TEXT,
    dead_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_synced ON queue(synced, id);
CREATE INDEX IF NOT EXISTS idx_queue_synced_at ON queue(synced_at);
CREATE INDEX IF NOT EXISTS idx_dead_letters_dead_at ON dead_letters(dead_at);
"#;

const ITEM_COLUMNS: &str =
    "id, kind, payload, enqueued_at, synced, synced_at, retry_count, last_retry_at, last_error";

const DEAD_LETTER_COLUMNS: &str =
    "id, kind, payload, enqueued_at, retry_count, last_error, dead_at";

/// Formats a timestamp for storage.
///
/// Always UTC with a fixed number of fractional digits, so stored values
/// compare correctly as text.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

fn parse_timestamp_opt(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}

fn row_to_item(row: &Row<'_>) -> std::result::Result<QueueItem, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let payload: String = row.get(2)?;
    let enqueued_at: String = row.get(3)?;
    Ok(QueueItem {
        id: row.get(0)?,
        op: StoredOp::decode(&kind, &payload),
        kind,
        enqueued_at: parse_timestamp(&enqueued_at, "enqueued_at")?,
        synced: row.get(4)?,
        synced_at: parse_timestamp_opt(row.get(5)?, "synced_at")?,
        retry_count: row.get(6)?,
        last_retry_at: parse_timestamp_opt(row.get(7)?, "last_retry_at")?,
        last_error: row.get(8)?,
    })
}

fn row_to_dead_letter(row: &Row<'_>) -> std::result::Result<DeadLetter, rusqlite::Error> {
    let enqueued_at: String = row.get(3)?;
    let dead_at: String = row.get(6)?;
    Ok(DeadLetter {
        id: row.get(0)?,
        kind: row.get(1)?,
        payload: row.get(2)?,
        enqueued_at: parse_timestamp(&enqueued_at, "enqueued_at")?,
        retry_count: row.get(4)?,
        last_error: row.get(5)?,
        dead_at: parse_timestamp(&dead_at, "dead_at")?,
    })
}

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Moves a queue row into `dead_letters` inside the caller's transaction.
///
/// `reason` replaces the row's `last_error` when given.
fn move_to_dead_letters(
    conn: &Connection,
    id: i64,
    dead_at: &str,
    reason: Option<&str>,
) -> Result<bool> {
    let moved = conn.execute(
        "INSERT INTO dead_letters (id, kind, payload, enqueued_at, retry_count, last_error, dead_at)
         SELECT id, kind, payload, enqueued_at, retry_count, COALESCE(?3, last_error), ?2
         FROM queue WHERE id = ?1 AND synced = 0",
        params![id, dead_at, reason],
    )?;
    if moved > 0 {
        conn.execute("DELETE FROM queue WHERE id = ?1", [id])?;
    }
    Ok(moved > 0)
}

/// Durable local queue of progress operations.
pub struct QueueStore {
    /// The underlying SQLite connection.
    pub conn: Connection,
    clock: Arc<dyn ClockSource>,
    max_retries: u32,
}

impl QueueStore {
    /// Open a queue at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open a queue at the given path using a custom clock.
    pub fn open_with_clock(path: &Path, clock: Arc<dyn ClockSource>) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;

        run_migrations(&conn)?;
        tracing::debug!("opened queue store at {}", path.display());
        Ok(QueueStore { conn, clock, max_retries: DEFAULT_MAX_RETRIES })
    }

    /// Open an in-memory queue (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Open an in-memory queue using a custom clock.
    pub fn open_in_memory_with_clock(clock: Arc<dyn ClockSource>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(QueueStore { conn, clock, max_retries: DEFAULT_MAX_RETRIES })
    }

    /// Sets the retry ceiling. Values below 1 are raised to 1.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Returns the retry ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    /// Append a new unsynced operation and return its id.
    ///
    /// The payload is validated first; nothing is written for invalid input.
    pub fn enqueue(&self, op: &ProgressOp) -> Result<i64> {
        op.validate()?;
        let payload = op.payload_json()?;
        self.conn.execute(
            "INSERT INTO queue (kind, payload, enqueued_at) VALUES (?1, ?2, ?3)",
            params![op.kind().as_str(), payload, self.now()],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, kind = %op.kind(), "enqueued progress operation");
        Ok(id)
    }

    /// Get a queue item by id, synced or not.
    pub fn get_item(&self, id: i64) -> Result<Option<QueueItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM queue WHERE id = ?1");
        let item = self.conn.query_row(&sql, [id], row_to_item).optional()?;
        Ok(item)
    }

    /// List every unsynced item in ascending id order.
    pub fn list_pending(&self) -> Result<Vec<QueueItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM queue WHERE synced = 0 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Count unsynced items.
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM queue WHERE synced = 0", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Mark an item as delivered.
    ///
    /// Returns false when there is no pending item with that id (already
    /// synced, withdrawn, or purged).
    pub fn mark_synced(&self, id: i64) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE queue SET synced = 1, synced_at = ?2 WHERE id = ?1 AND synced = 0",
            params![id, self.now()],
        )?;
        Ok(updated > 0)
    }

    /// Record a failed delivery attempt.
    ///
    /// Once the retry count reaches the ceiling the item is moved to the
    /// dead-letter table and no longer appears in [`list_pending`](Self::list_pending).
    pub fn increment_retry(&mut self, id: i64, error: &str) -> Result<RetryOutcome> {
        let now = self.now();
        let max_retries = self.max_retries;
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE queue SET retry_count = retry_count + 1, last_retry_at = ?2, last_error = ?3
             WHERE id = ?1 AND synced = 0",
            params![id, now, error],
        )?;
        if updated == 0 {
            return Ok(RetryOutcome::Missing);
        }

        let retry_count: u32 =
            tx.query_row("SELECT retry_count FROM queue WHERE id = ?1", [id], |row| row.get(0))?;

        let outcome = if retry_count >= max_retries {
            move_to_dead_letters(&tx, id, &now, None)?;
            RetryOutcome::DeadLettered { retry_count }
        } else {
            RetryOutcome::Retrying { retry_count }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Withdraw a pending item immediately, recording `reason`.
    ///
    /// Used for items that can never be delivered. Returns false when no
    /// pending item with that id exists.
    pub fn dead_letter(&mut self, id: i64, reason: &str) -> Result<bool> {
        let now = self.now();
        let tx = self.conn.transaction()?;
        let moved = move_to_dead_letters(&tx, id, &now, Some(reason))?;
        tx.commit()?;
        Ok(moved)
    }

    /// Delete synced items whose `synced_at` is older than `age`.
    ///
    /// Unsynced items are never touched. Returns the number of rows removed.
    pub fn purge_synced_older_than(&self, age: Duration) -> Result<usize> {
        let Some(cutoff) = self.cutoff(age) else {
            return Ok(0);
        };
        let removed = self.conn.execute(
            "DELETE FROM queue WHERE synced = 1 AND synced_at IS NOT NULL AND synced_at < ?1",
            [cutoff],
        )?;
        Ok(removed)
    }

    /// List dead letters, oldest first.
    pub fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let sql = format!("SELECT {DEAD_LETTER_COLUMNS} FROM dead_letters ORDER BY dead_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let letters = stmt
            .query_map([], row_to_dead_letter)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(letters)
    }

    /// Count dead letters.
    pub fn dead_letter_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM dead_letters", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Put a dead letter back on the queue with a fresh retry budget.
    ///
    /// The item gets a new id (ids are never reused) but keeps its original
    /// `enqueued_at`. Returns the new id.
    pub fn requeue_dead_letter(&mut self, id: i64) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let sql = format!("SELECT {DEAD_LETTER_COLUMNS} FROM dead_letters WHERE id = ?1");
        let letter = tx
            .query_row(&sql, [id], row_to_dead_letter)
            .optional()?
            .ok_or(Error::DeadLetterNotFound(id))?;

        // Undecodable items would only be withdrawn again
        if let StoredOp::Unknown { reason, .. } = StoredOp::decode(&letter.kind, &letter.payload) {
            return Err(Error::InvalidInput(format!(
                "dead letter {id} cannot be requeued: {reason}"
            )));
        }

        tx.execute(
            "INSERT INTO queue (kind, payload, enqueued_at) VALUES (?1, ?2, ?3)",
            params![letter.kind, letter.payload, format_timestamp(letter.enqueued_at)],
        )?;
        let new_id = tx.last_insert_rowid();
        tx.execute("DELETE FROM dead_letters WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(new_id)
    }

    /// Permanently delete a dead letter.
    pub fn discard_dead_letter(&self, id: i64) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM dead_letters WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(Error::DeadLetterNotFound(id));
        }
        Ok(())
    }

    /// `now - age` as a stored timestamp, or `None` when that instant is
    /// before anything the store can hold.
    fn cutoff(&self, age: Duration) -> Option<String> {
        self.clock.now().checked_sub_signed(age).map(format_timestamp)
    }

    /// Delete dead letters withdrawn more than `age` ago.
    pub fn purge_dead_letters_older_than(&self, age: Duration) -> Result<usize> {
        let Some(cutoff) = self.cutoff(age) else {
            return Ok(0);
        };
        let removed = self.conn.execute("DELETE FROM dead_letters WHERE dead_at < ?1", [cutoff])?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
