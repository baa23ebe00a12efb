//! Domain scheduling records: which hosts to probe and how the last try went

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

const DOMAIN_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS domainnames (
    domainname            TEXT PRIMARY KEY NOT NULL,
    last_successful_timet INTEGER NOT NULL,
    last_attempted_timet  INTEGER NOT NULL,
    last_result           TEXT
);
";

/// Scheduling state for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub domainname: String,
    pub last_successful_timet: i64,
    pub last_attempted_timet: i64,
    pub last_result: Option<String>,
}

/// The domainnames bookkeeping store.
///
/// Kept separate from the certificate database so the corpus can be copied
/// or rebuilt without dragging scheduling state along. During a harvest only
/// the aggregator writes here.
pub struct DomainStore {
    conn: Connection,
}

impl DomainStore {
    /// Open or create the bookkeeping database
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        conn.execute_batch(DOMAIN_SCHEMA)?;

        Ok(Self { conn })
    }

    /// Add a domain with blank scheduling state; `true` if it was new.
    ///
    /// Existing rows keep their state, so re-importing a list never clobbers
    /// probe history.
    pub fn add_candidate(&self, domainname: &str) -> rusqlite::Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO domainnames
             (domainname, last_successful_timet, last_attempted_timet, last_result)
             VALUES (?1, 0, 0, NULL)",
            params![domainname],
        )?;
        Ok(inserted > 0)
    }

    /// Domains whose last attempt is older than `cutoff_timet`
    pub fn candidates(&self, cutoff_timet: i64) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT domainname FROM domainnames WHERE last_attempted_timet < ?1")?;
        let rows = stmt.query_map(params![cutoff_timet], |row| row.get(0))?;
        rows.collect()
    }

    /// Record an unsuccessful probe: only the attempt timestamp moves
    pub fn record_attempt(&self, domainname: &str, timet: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO domainnames
             (domainname, last_successful_timet, last_attempted_timet, last_result)
             VALUES (?1, 0, ?2, NULL)
             ON CONFLICT(domainname) DO UPDATE SET
                 last_attempted_timet = excluded.last_attempted_timet",
            params![domainname, timet],
        )?;
        Ok(())
    }

    /// Record a successful probe: both timestamps and the result move
    pub fn record_success(&self, domainname: &str, timet: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO domainnames
             (domainname, last_successful_timet, last_attempted_timet, last_result)
             VALUES (?1, ?2, ?2, 'ok')
             ON CONFLICT(domainname) DO UPDATE SET
                 last_successful_timet = excluded.last_successful_timet,
                 last_attempted_timet  = excluded.last_attempted_timet,
                 last_result           = excluded.last_result",
            params![domainname, timet],
        )?;
        Ok(())
    }

    /// Fetch one record
    pub fn get(&self, domainname: &str) -> rusqlite::Result<Option<DomainRecord>> {
        self.conn
            .query_row(
                "SELECT domainname, last_successful_timet, last_attempted_timet, last_result
                 FROM domainnames WHERE domainname = ?1",
                params![domainname],
                row_to_record,
            )
            .optional()
    }

    /// Zero every domain's scheduling state; returns how many rows changed
    pub fn reset(&self) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE domainnames
             SET last_successful_timet = 0, last_attempted_timet = 0, last_result = NULL",
            [],
        )
    }

    /// (total domains, domains with a recorded success)
    pub fn stats(&self) -> rusqlite::Result<(u64, u64)> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM domainnames", [], |row| row.get(0))?;
        let succeeded: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM domainnames WHERE last_successful_timet != 0",
            [],
            |row| row.get(0),
        )?;
        Ok((total as u64, succeeded as u64))
    }

    /// Move WAL contents into the main database file
    pub fn flush(&self) -> rusqlite::Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_row| Ok(()))?;
        Ok(())
    }

    /// Flush and release the store, surfacing any final write error
    pub fn close(self) -> rusqlite::Result<()> {
        self.flush()
    }
}

/// Convert a database row to a DomainRecord
fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DomainRecord> {
    Ok(DomainRecord {
        domainname: row.get(0)?,
        last_successful_timet: row.get(1)?,
        last_attempted_timet: row.get(2)?,
        last_result: row.get(3)?,
    })
}
