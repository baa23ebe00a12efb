// File: src/storage/toc.rs

//! Table of contents: which certificates a host presented at what time

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::hash::{CertHash, HASH_LEN};

const TOC_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS connections (
    conn_id         INTEGER PRIMARY KEY,
    leaf_only       BOOLEAN NOT NULL,
    fetch_timestamp INTEGER NOT NULL,
    servername      VARCHAR NOT NULL,
    cert_hashes     BLOB NOT NULL,
    UNIQUE(servername, fetch_timestamp)
);
";

/// Enumeration order for connection listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}

/// One TOC row: a single observation of a host's certificate chain.
///
/// `cert_hashes` preserves wire order, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub conn_id: i64,
    pub servername: String,
    pub fetch_timestamp: i64,
    pub leaf_only: bool,
    pub cert_hashes: Vec<CertHash>,
}

/// The connections table, kept in its own SQLite file next to the shards.
///
/// Rows reference certificates by digest only; the TOC knows nothing about
/// blob storage or garbage collection.
pub struct TocStore {
    conn: Connection,
}

impl TocStore {
    /// Open or create the TOC database
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory TOC (for testing)
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        conn.execute_batch(TOC_SCHEMA)?;

        Ok(Self { conn })
    }

    /// Record one observation.
    ///
    /// Returns the new `conn_id`, or `None` when a row for this
    /// `(servername, fetch_timestamp)` pair already exists. At most one
    /// observation per host per second is ever kept, so callers must not
    /// assume an id is produced.
    pub fn insert(
        &self,
        servername: &str,
        fetch_timestamp: i64,
        cert_hashes: &[CertHash],
        leaf_only: bool,
    ) -> rusqlite::Result<Option<i64>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO connections (leaf_only, fetch_timestamp, servername, cert_hashes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                leaf_only,
                fetch_timestamp,
                servername,
                pack_hashes(cert_hashes)
            ],
        )?;

        if inserted == 0 {
            Ok(None)
        } else {
            Ok(Some(self.conn.last_insert_rowid()))
        }
    }

    /// Fetch one entry by id
    pub fn get(&self, conn_id: i64) -> rusqlite::Result<Option<TocEntry>> {
        self.conn
            .query_row(
                "SELECT conn_id, leaf_only, fetch_timestamp, servername, cert_hashes
                 FROM connections WHERE conn_id = ?1",
                params![conn_id],
                row_to_entry,
            )
            .optional()
    }

    /// All entries for one servername, oldest first
    pub fn entries_for_servername(&self, servername: &str) -> rusqlite::Result<Vec<TocEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT conn_id, leaf_only, fetch_timestamp, servername, cert_hashes
             FROM connections WHERE servername = ?1 ORDER BY fetch_timestamp ASC",
        )?;
        let rows = stmt.query_map(params![servername], row_to_entry)?;
        rows.collect()
    }

    /// Every conn_id, ordered by fetch time.
    ///
    /// The id list is cheap to hold; callers resolve entries one at a time,
    /// so a full walk never keeps more than one entry in memory.
    pub fn connection_ids(&self, order: SortOrder) -> rusqlite::Result<Vec<i64>> {
        let sql = match order {
            SortOrder::OldestFirst => {
                "SELECT conn_id FROM connections ORDER BY fetch_timestamp ASC"
            }
            SortOrder::NewestFirst => {
                "SELECT conn_id FROM connections ORDER BY fetch_timestamp DESC"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    /// Latest fetch timestamp per servername
    pub fn most_recent_per_servername(&self) -> rusqlite::Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT servername, MAX(fetch_timestamp) FROM connections GROUP BY servername",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// The set of every digest referenced by any connection
    pub fn all_referenced_hashes(&self) -> rusqlite::Result<HashSet<CertHash>> {
        let mut stmt = self.conn.prepare("SELECT cert_hashes FROM connections")?;
        let mut rows = stmt.query([])?;

        let mut referenced = HashSet::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(0)?;
            let hashes = unpack_hashes(&blob).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    0,
                    "cert_hashes".into(),
                    rusqlite::types::Type::Blob,
                )
            })?;
            referenced.extend(hashes);
        }
        Ok(referenced)
    }

    /// Remove one entry; `true` if it existed
    pub fn remove(&self, conn_id: i64) -> rusqlite::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM connections WHERE conn_id = ?1", params![conn_id])?;
        Ok(removed > 0)
    }

    /// Number of recorded connections
    pub fn count(&self) -> rusqlite::Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM connections", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Reclaim space released by removals
    pub fn compact(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch("VACUUM")
    }

    /// Move WAL contents into the main database file
    pub fn flush(&self) -> rusqlite::Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_row| Ok(()))?;
        Ok(())
    }
}

/// Concatenate digests into the packed column form, preserving order
fn pack_hashes(hashes: &[CertHash]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(hashes.len() * HASH_LEN);
    for hash in hashes {
        blob.extend_from_slice(hash.as_bytes());
    }
    blob
}

/// Split a packed digest column; `None` if the length is not a multiple of 32
fn unpack_hashes(blob: &[u8]) -> Option<Vec<CertHash>> {
    if blob.len() % HASH_LEN != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(HASH_LEN)
            .filter_map(CertHash::from_slice)
            .collect(),
    )
}

/// Convert a database row to a TocEntry
fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<TocEntry> {
    let conn_id: i64 = row.get(0)?;
    let leaf_only: bool = row.get(1)?;
    let fetch_timestamp: i64 = row.get(2)?;
    let servername: String = row.get(3)?;
    let blob: Vec<u8> = row.get(4)?;

    let cert_hashes = unpack_hashes(&blob).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(4, "cert_hashes".into(), rusqlite::types::Type::Blob)
    })?;

    Ok(TocEntry {
        conn_id,
        servername,
        fetch_timestamp,
        leaf_only,
        cert_hashes,
    })
}
