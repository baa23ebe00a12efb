// File: src/storage/cert_store.rs

//! Sharded certificate store: 256 shard files routed by digest byte

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CorpusResult;
use crate::hash::CertHash;
use crate::storage::shard::ShardStore;

/// Number of blob store shards
pub const SHARD_COUNT: usize = 256;

/// Content-addressed certificate store split across 256 shard files.
///
/// A certificate's digest decides its shard (`CertHash::shard_index`), so the
/// same digest routes to the same file on insert and lookup. The digest is
/// computed once here and handed down.
pub struct ShardedCertStore {
    shards: Vec<ShardStore>,
}

impl ShardedCertStore {
    /// Open or create all 256 shard files under `dir`
    pub fn open(dir: &Path) -> CorpusResult<Self> {
        fs::create_dir_all(dir)?;

        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for index in 0..SHARD_COUNT {
            shards.push(ShardStore::open(&shard_path(dir, index))?);
        }

        Ok(Self { shards })
    }

    /// Store a certificate; returns its digest and whether it was new
    pub fn insert(&self, der_cert: &[u8]) -> CorpusResult<(CertHash, bool)> {
        let hash = CertHash::compute(der_cert);
        let created = self.shard_for(&hash).insert_hashed(&hash, der_cert)?;
        Ok((hash, created))
    }

    /// Fetch a certificate by digest
    pub fn get(&self, hash: &CertHash) -> CorpusResult<Option<Vec<u8>>> {
        Ok(self.shard_for(hash).get(hash)?)
    }

    /// Remove a certificate by digest; `true` if it was present
    pub fn remove(&self, hash: &CertHash) -> CorpusResult<bool> {
        Ok(self.shard_for(hash).remove(hash)?)
    }

    /// All digests across every shard
    pub fn all_hashes(&self) -> CorpusResult<HashSet<CertHash>> {
        let mut all = HashSet::new();
        for shard in &self.shards {
            all.extend(shard.hashes()?);
        }
        Ok(all)
    }

    /// Total certificate count across shards
    pub fn total_count(&self) -> CorpusResult<u64> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.count()?;
        }
        Ok(total)
    }

    /// Visit shards in index order (00 through ff).
    ///
    /// Full-corpus scans go shard by shard through this so only one shard's
    /// worth of digests needs to be held at a time.
    pub fn shards(&self) -> impl Iterator<Item = &ShardStore> {
        self.shards.iter()
    }

    /// VACUUM every shard, one at a time
    pub fn compact_all(&self) -> CorpusResult<()> {
        for shard in &self.shards {
            shard.compact()?;
        }
        Ok(())
    }

    /// Checkpoint every shard's WAL
    pub fn flush(&self) -> CorpusResult<()> {
        for shard in &self.shards {
            shard.flush()?;
        }
        Ok(())
    }

    fn shard_for(&self, hash: &CertHash) -> &ShardStore {
        &self.shards[hash.shard_index()]
    }
}

/// Path of shard `index` under `dir` ("00.sqlite3" through "ff.sqlite3")
pub fn shard_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index:02x}.sqlite3"))
}
