// File: src/storage/shard.rs

//! Single blob store shard backed by one SQLite file

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::hash::CertHash;

const SHARD_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    cert_sha256 BLOB PRIMARY KEY,
    der_cert    BLOB NOT NULL
);
";

/// One shard of the certificate blob store.
///
/// Holds every certificate whose digest begins with this shard's byte. All
/// operations are local to the shard's file; there are no cross-shard
/// transactions anywhere in the store.
pub struct ShardStore {
    conn: Connection,
}

impl ShardStore {
    /// Open or create a shard database
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory shard (for testing)
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        conn.execute_batch(SHARD_SCHEMA)?;

        Ok(Self { conn })
    }

    /// Store a certificate keyed by its SHA-256 digest.
    ///
    /// Returns the digest and whether a row was newly created. Re-inserting
    /// bytes that are already present is a no-op reporting `false`.
    pub fn insert(&self, der_cert: &[u8]) -> rusqlite::Result<(CertHash, bool)> {
        let hash = CertHash::compute(der_cert);
        let created = self.insert_hashed(&hash, der_cert)?;
        Ok((hash, created))
    }

    /// Store a certificate under a digest the caller already computed
    pub(super) fn insert_hashed(&self, hash: &CertHash, der_cert: &[u8]) -> rusqlite::Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO certificates (cert_sha256, der_cert) VALUES (?1, ?2)",
            params![hash.as_bytes().as_slice(), der_cert],
        )?;
        Ok(inserted > 0)
    }

    /// Fetch a certificate by digest
    pub fn get(&self, hash: &CertHash) -> rusqlite::Result<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT der_cert FROM certificates WHERE cert_sha256 = ?1",
                params![hash.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()
    }

    /// Remove a certificate by digest; `true` if a row existed
    pub fn remove(&self, hash: &CertHash) -> rusqlite::Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM certificates WHERE cert_sha256 = ?1",
            params![hash.as_bytes().as_slice()],
        )?;
        Ok(removed > 0)
    }

    /// All digests stored in this shard
    pub fn hashes(&self) -> rusqlite::Result<Vec<CertHash>> {
        let mut stmt = self.conn.prepare("SELECT cert_sha256 FROM certificates")?;
        let rows = stmt.query_map([], row_to_hash)?;
        rows.collect()
    }

    /// Every (digest, blob) pair in this shard.
    ///
    /// Full-corpus scans call this one shard at a time, so at most one
    /// shard's worth of certificate bytes is ever held in memory.
    pub fn blobs(&self) -> rusqlite::Result<Vec<(CertHash, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cert_sha256, der_cert FROM certificates")?;
        let rows = stmt.query_map([], |row| {
            let hash = row_to_hash(row)?;
            let der: Vec<u8> = row.get(1)?;
            Ok((hash, der))
        })?;
        rows.collect()
    }

    /// Number of certificates in this shard
    pub fn count(&self) -> rusqlite::Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Reclaim space released by removals. Blocks the shard while it runs.
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

/// Convert a digest column to a CertHash
fn row_to_hash(row: &rusqlite::Row) -> rusqlite::Result<CertHash> {
    let bytes: Vec<u8> = row.get(0)?;
    CertHash::from_slice(&bytes).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(0, "cert_sha256".into(), rusqlite::types::Type::Blob)
    })
}
