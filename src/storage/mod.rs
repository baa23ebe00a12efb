//! Storage module
//!
//! The certificate database: 256 content-addressed blob shards, the
//! connection TOC tying hostnames and fetch times to certificate sets, and
//! the consistency repair pass over both.

pub mod cert_store;
pub mod database;
pub mod repair;
pub mod shard;
pub mod toc;

// Re-export main storage types
pub use cert_store::{shard_path, ShardedCertStore, SHARD_COUNT};
pub use database::{CertDatabase, ConnectionRecord, CorpusStats, StoredCert, TOC_FILENAME};
pub use repair::{run_repair, RepairOptions, RepairReport};
pub use shard::ShardStore;
pub use toc::{SortOrder, TocEntry, TocStore};
