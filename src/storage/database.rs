// File: src/storage/database.rs

//! The certificate database: blob shards plus the connection TOC

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::CorpusResult;
use crate::hash::CertHash;
use crate::storage::cert_store::ShardedCertStore;
use crate::storage::toc::{SortOrder, TocStore};

/// TOC filename inside the corpus directory
pub const TOC_FILENAME: &str = "toc.sqlite3";

/// A TOC entry with its certificates resolved from blob storage
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub conn_id: i64,
    pub servername: String,
    pub fetch_timestamp: i64,
    pub leaf_only: bool,
    /// Wire order, leaf first
    pub certs: Vec<StoredCert>,
}

/// One referenced certificate; `der` is `None` when the blob is missing
#[derive(Debug, Clone)]
pub struct StoredCert {
    pub hash: CertHash,
    pub der: Option<Vec<u8>>,
}

/// Corpus size counters
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CorpusStats {
    pub connections: u64,
    pub certificates: u64,
}

/// One corpus directory: `toc.sqlite3` plus shards `00` through `ff`.
///
/// Writes go blob-store-first: `insert_connection` stores every certificate
/// before the TOC row referencing them, so an interrupted insert can leave
/// orphan blobs (collected later) but never a connection pointing at nothing.
pub struct CertDatabase {
    pub(super) toc: TocStore,
    pub(super) certs: ShardedCertStore,
}

impl CertDatabase {
    /// Open or create a corpus under `dir`
    pub fn open(dir: &Path) -> CorpusResult<Self> {
        fs::create_dir_all(dir)?;

        let toc = TocStore::open(&dir.join(TOC_FILENAME))?;
        let certs = ShardedCertStore::open(dir)?;

        Ok(Self { toc, certs })
    }

    /// Record one observation of `servername`'s chain.
    ///
    /// Certificates are deduplicated by digest; re-observed chains cost one
    /// TOC row and nothing in blob storage. Returns `None` when an
    /// observation for this host and second already exists.
    pub fn insert_connection(
        &self,
        servername: &str,
        fetch_timestamp: i64,
        certs: &[Vec<u8>],
        leaf_only: bool,
    ) -> CorpusResult<Option<i64>> {
        let mut hashes = Vec::with_capacity(certs.len());
        for der in certs {
            let (hash, _created) = self.certs.insert(der)?;
            hashes.push(hash);
        }

        Ok(self
            .toc
            .insert(servername, fetch_timestamp, &hashes, leaf_only)?)
    }

    /// Fetch one connection with its certificates resolved
    pub fn connection(&self, conn_id: i64) -> CorpusResult<Option<ConnectionRecord>> {
        let Some(entry) = self.toc.get(conn_id)? else {
            return Ok(None);
        };

        let mut certs = Vec::with_capacity(entry.cert_hashes.len());
        for hash in &entry.cert_hashes {
            certs.push(StoredCert {
                hash: *hash,
                der: self.certs.get(hash)?,
            });
        }

        Ok(Some(ConnectionRecord {
            conn_id: entry.conn_id,
            servername: entry.servername,
            fetch_timestamp: entry.fetch_timestamp,
            leaf_only: entry.leaf_only,
            certs,
        }))
    }

    /// All connections recorded for a servername, oldest first
    pub fn connections_for(&self, servername: &str) -> CorpusResult<Vec<ConnectionRecord>> {
        let entries = self.toc.entries_for_servername(servername)?;
        let mut connections = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(conn) = self.connection(entry.conn_id)? {
                connections.push(conn);
            }
        }
        Ok(connections)
    }

    /// Every conn_id in fetch-time order
    pub fn connection_ids(&self, order: SortOrder) -> CorpusResult<Vec<i64>> {
        Ok(self.toc.connection_ids(order)?)
    }

    /// Latest fetch timestamp per servername
    pub fn most_recent_connections(&self) -> CorpusResult<Vec<(String, i64)>> {
        Ok(self.toc.most_recent_per_servername()?)
    }

    /// Fetch one certificate by digest
    pub fn certificate(&self, hash: &CertHash) -> CorpusResult<Option<Vec<u8>>> {
        self.certs.get(hash)
    }

    /// Digests referenced by at least one connection
    pub fn all_referenced_hashes(&self) -> CorpusResult<HashSet<CertHash>> {
        Ok(self.toc.all_referenced_hashes()?)
    }

    /// Remove one connection from the TOC.
    ///
    /// Blobs it referenced stay put; unreferenced ones are the repair pass's
    /// job to collect.
    pub fn remove_connection(&self, conn_id: i64) -> CorpusResult<bool> {
        Ok(self.toc.remove(conn_id)?)
    }

    /// Remove one certificate blob by digest
    pub fn remove_certificate(&self, hash: &CertHash) -> CorpusResult<bool> {
        self.certs.remove(hash)
    }

    /// The underlying sharded blob store
    pub fn cert_store(&self) -> &ShardedCertStore {
        &self.certs
    }

    pub fn connection_count(&self) -> CorpusResult<u64> {
        Ok(self.toc.count()?)
    }

    pub fn certificate_count(&self) -> CorpusResult<u64> {
        self.certs.total_count()
    }

    pub fn stats(&self) -> CorpusResult<CorpusStats> {
        Ok(CorpusStats {
            connections: self.connection_count()?,
            certificates: self.certificate_count()?,
        })
    }

    /// Checkpoint the TOC and every shard
    pub fn flush(&self) -> CorpusResult<()> {
        self.toc.flush()?;
        self.certs.flush()
    }

    /// VACUUM every storage file. Not atomic across files, which is safe:
    /// compaction never changes logical content.
    pub fn compact_all(&self) -> CorpusResult<()> {
        self.certs.compact_all()?;
        Ok(self.toc.compact()?)
    }

    /// Flush and release the corpus, surfacing any final write error
    pub fn close(self) -> CorpusResult<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_connection_stores_blobs_and_toc_row() {
        let dir = tempdir().unwrap();
        let db = CertDatabase::open(dir.path()).unwrap();

        let chain = vec![b"leaf cert".to_vec(), b"ca cert".to_vec()];
        let id = db
            .insert_connection("example.com", 1000, &chain, false)
            .unwrap()
            .unwrap();

        let conn = db.connection(id).unwrap().unwrap();
        assert_eq!(conn.servername, "example.com");
        assert_eq!(conn.fetch_timestamp, 1000);
        assert_eq!(conn.certs.len(), 2);
        assert_eq!(conn.certs[0].der.as_deref(), Some(b"leaf cert".as_slice()));
        assert_eq!(conn.certs[1].der.as_deref(), Some(b"ca cert".as_slice()));

        assert_eq!(db.certificate_count().unwrap(), 2);
        assert_eq!(db.connection_count().unwrap(), 1);
    }

    #[test]
    fn test_shared_certificates_are_stored_once() {
        let dir = tempdir().unwrap();
        let db = CertDatabase::open(dir.path()).unwrap();

        let shared_ca = b"shared ca".to_vec();
        db.insert_connection(
            "a.example",
            1000,
            &[b"leaf a".to_vec(), shared_ca.clone()],
            false,
        )
        .unwrap();
        db.insert_connection(
            "b.example",
            1000,
            &[b"leaf b".to_vec(), shared_ca.clone()],
            false,
        )
        .unwrap();

        // Two leaves plus one shared CA
        assert_eq!(db.certificate_count().unwrap(), 3);
        assert_eq!(db.connection_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_observation_is_noop() {
        let dir = tempdir().unwrap();
        let db = CertDatabase::open(dir.path()).unwrap();

        let chain = vec![b"leaf".to_vec()];
        assert!(db
            .insert_connection("example.com", 1000, &chain, false)
            .unwrap()
            .is_some());
        assert!(db
            .insert_connection("example.com", 1000, &chain, false)
            .unwrap()
            .is_none());

        assert_eq!(db.connection_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_blob_resolves_to_none() {
        let dir = tempdir().unwrap();
        let db = CertDatabase::open(dir.path()).unwrap();

        let id = db
            .insert_connection("example.com", 1000, &[b"vanishing".to_vec()], false)
            .unwrap()
            .unwrap();

        let hash = CertHash::compute(b"vanishing");
        assert!(db.remove_certificate(&hash).unwrap());

        let conn = db.connection(id).unwrap().unwrap();
        assert_eq!(conn.certs.len(), 1);
        assert_eq!(conn.certs[0].hash, hash);
        assert!(conn.certs[0].der.is_none());
    }

    #[test]
    fn test_reopen_preserves_content() {
        let dir = tempdir().unwrap();
        let id;
        {
            let db = CertDatabase::open(dir.path()).unwrap();
            id = db
                .insert_connection("example.com", 1000, &[b"durable".to_vec()], false)
                .unwrap()
                .unwrap();
            db.close().unwrap();
        }

        let db = CertDatabase::open(dir.path()).unwrap();
        let conn = db.connection(id).unwrap().unwrap();
        assert_eq!(conn.certs[0].der.as_deref(), Some(b"durable".as_slice()));
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let db = CertDatabase::open(dir.path()).unwrap();

        db.insert_connection("a.example", 1000, &[b"one".to_vec()], false)
            .unwrap();
        db.insert_connection("a.example", 2000, &[b"one".to_vec(), b"two".to_vec()], false)
            .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.certificates, 2);
    }
}
