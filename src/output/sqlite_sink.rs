//! SQLite sink
//!
//! Each crawl run gets a row in `runs`; every successful page becomes a row
//! in `results` tagged with that run. Rows from earlier runs are kept.

use crate::output::traits::{Sink, SinkResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    seed_url TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    stop_reason TEXT
);

-- One row per successfully fetched page
CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_run ON results(run_id);
CREATE INDEX IF NOT EXISTS idx_results_url ON results(url);
"#;

/// A stored result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub run_id: i64,
    pub url: String,
    pub title: String,
    pub crawled_at: String,
}

/// Sink that appends results to a SQLite database
pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `seed_url` - Seed URL of the run
    /// * `config_hash` - Hash of the configuration that produced the run
    pub fn open(path: &Path, seed_url: &str, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::start(conn, seed_url, config_hash)
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory(seed_url: &str, config_hash: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, seed_url, config_hash)
    }

    fn start(conn: Connection, seed_url: &str, config_hash: &str) -> SinkResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, seed_url, config_hash) VALUES (?1, ?2, ?3)",
            params![now, seed_url, config_hash],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!(run_id, "Started SQLite run record");

        Ok(Self { conn, run_id })
    }

    /// The id of the run this sink writes to
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Records the finish time and stop reason of the run
    pub fn finish_run(&mut self, stop_reason: &str) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, stop_reason = ?2 WHERE id = ?3",
            params![now, stop_reason, self.run_id],
        )?;
        Ok(())
    }

    /// Loads the results written by this run, in insertion order
    pub fn results(&self) -> SinkResult<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, url, title, crawled_at FROM results WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![self.run_id], |row| {
                Ok(ResultRecord {
                    run_id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    crawled_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Returns the stop reason recorded for this run, if finished
    pub fn stop_reason(&self) -> SinkResult<Option<String>> {
        let reason = self.conn.query_row(
            "SELECT stop_reason FROM runs WHERE id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(reason)
    }
}

impl Sink for SqliteSink {
    fn write(&mut self, address: &str, title: &str) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO results (run_id, url, title, crawled_at) VALUES (?1, ?2, ?3, ?4)",
            params![self.run_id, address, title, now],
        )?;
        Ok(())
    }

    fn finish(&mut self, stop_reason: &str) -> SinkResult<()> {
        self.finish_run(stop_reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let mut sink = SqliteSink::open_in_memory("https://example.com/", "abc").unwrap();
        sink.write("https://example.com/", "Home").unwrap();
        sink.write("https://example.com/about", "About").unwrap();

        let rows = sink.results().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].url, "https://example.com/");
        assert_eq!(rows[0].title, "Home");
        assert_eq!(rows[1].url, "https://example.com/about");
        assert!(rows.iter().all(|r| r.run_id == sink.run_id()));
    }

    #[test]
    fn test_finish_run_records_reason() {
        let mut sink = SqliteSink::open_in_memory("https://example.com/", "abc").unwrap();
        assert_eq!(sink.stop_reason().unwrap(), None);

        sink.finish_run("traversal_complete").unwrap();
        assert_eq!(
            sink.stop_reason().unwrap(),
            Some("traversal_complete".to_string())
        );
    }

    #[test]
    fn test_runs_are_separate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.db");

        let mut first = SqliteSink::open(&path, "https://example.com/", "abc").unwrap();
        first.write("https://example.com/", "Home").unwrap();
        drop(first);

        let mut second = SqliteSink::open(&path, "https://example.com/", "abc").unwrap();
        second.write("https://example.com/other", "Other").unwrap();

        let rows = second.results().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://example.com/other");
        assert_eq!(second.run_id(), 2);
    }
}
