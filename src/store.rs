//! Append-only SQLite storage for enrichment records.
//!
//! The store owns only a path. Every write opens its own connection, runs one
//! insert inside a transaction and closes the connection again, so concurrent
//! requests only ever meet at SQLite's own locking. Failures are returned to
//! the caller and never swallowed.
use crate::util::utc_timestamp;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original TEXT,
        analysis TEXT,
        sentiment TEXT,
        timestamp TEXT,
        source TEXT
    )
";

const INSERT_SQL: &str = "
    INSERT INTO results (original, analysis, sentiment, timestamp, source)
    VALUES (?1, ?2, ?3, ?4, ?5)
";

/// A row of the `results` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentRecord {
    pub id: i64,
    pub original: String,
    pub analysis: Option<String>,
    pub sentiment: Option<String>,
    pub timestamp: String,
    pub source: String,
}

/// Fields supplied by the caller for a new row; `id` and `timestamp` are
/// assigned by the store.
#[derive(Debug, Clone, Copy)]
pub struct NewRecord<'a> {
    pub original: &'a str,
    pub analysis: Option<&'a str>,
    pub sentiment: Option<&'a str>,
    pub source: &'a str,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Open the store at `path`, creating the `results` table if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA_SQL)
            .with_context(|| format!("create results table in {}", store.path.display()))?;
        Ok(store)
    }

    /// Open an existing store for reading; never creates the file.
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        store.connect_read_only()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert one record and return the timestamp assigned to it.
    pub fn store(&self, record: &NewRecord<'_>) -> Result<String> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("begin results transaction")?;
        let timestamp = utc_timestamp();
        tx.execute(
            INSERT_SQL,
            params![
                record.original,
                record.analysis,
                record.sentiment,
                timestamp,
                record.source
            ],
        )
        .context("insert result row")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("commit result row")?;
        tracing::debug!(id, original = record.original, "result stored");
        Ok(timestamp)
    }

    /// Every stored record in insertion order.
    pub fn records(&self) -> Result<Vec<EnrichmentRecord>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, original, analysis, sentiment, timestamp, source
                 FROM results ORDER BY id",
            )
            .context("prepare results query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EnrichmentRecord {
                    id: row.get(0)?,
                    original: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    analysis: row.get(2)?,
                    sentiment: row.get(3)?,
                    timestamp: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                })
            })
            .context("query results")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read result rows")
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open results db {}", self.path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("set results db busy timeout")?;
        Ok(conn)
    }

    fn connect_read_only(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open results db {} read-only", self.path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("set results db busy timeout")?;
        Ok(conn)
    }
}
