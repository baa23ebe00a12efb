// File: src/storage/repair.rs

//! Corpus consistency repair: dangling connections, orphan blobs, compaction

use serde::Serialize;

use crate::error::CorpusResult;
use crate::storage::database::CertDatabase;
use crate::storage::toc::SortOrder;

/// Which repair phases to run
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Remove connections referencing missing certificate blobs
    pub check_connections: bool,
    /// Remove stored blobs no connection references
    pub check_orphans: bool,
    /// VACUUM every storage file afterwards
    pub compact: bool,
    /// Report problems without modifying anything
    pub stats_only: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            check_connections: true,
            check_orphans: true,
            compact: true,
            stats_only: false,
        }
    }
}

/// What a repair pass found (and, unless stats-only, fixed)
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RepairReport {
    pub connections_checked: u64,
    pub dangling_connections: u64,
    pub referenced_certificates: u64,
    pub stored_certificates: u64,
    pub orphan_certificates: u64,
}

/// Run the repair phases enabled in `options`.
///
/// Phase order is load-bearing: removing a dangling connection shrinks the
/// referenced set, so the connection check must run before orphan collection,
/// and compaction runs last to reclaim what the removals released.
pub fn run_repair(db: &CertDatabase, options: &RepairOptions) -> CorpusResult<RepairReport> {
    let mut report = RepairReport::default();

    if options.check_connections {
        check_connections(db, options.stats_only, &mut report)?;
    }

    if options.check_orphans {
        check_orphans(db, options.stats_only, &mut report)?;
    }

    if options.compact && !options.stats_only {
        tracing::info!("compacting storage files");
        db.compact_all()?;
    }

    Ok(report)
}

/// Walk every connection and drop those referencing missing blobs.
///
/// Losing an index entry is recoverable by re-probing the host; keeping a
/// reference to a blob that is gone is not.
fn check_connections(
    db: &CertDatabase,
    stats_only: bool,
    report: &mut RepairReport,
) -> CorpusResult<()> {
    let ids = db.connection_ids(SortOrder::OldestFirst)?;
    tracing::info!(connections = ids.len(), "checking connections");

    for (i, conn_id) in ids.iter().enumerate() {
        if i > 0 && i % 10_000 == 0 {
            tracing::info!(checked = i, total = ids.len(), "connection check progress");
        }

        let Some(conn) = db.connection(*conn_id)? else {
            continue;
        };
        report.connections_checked += 1;

        let dangling = conn.certs.iter().any(|cert| cert.der.is_none());
        if dangling {
            for cert in conn.certs.iter().filter(|cert| cert.der.is_none()) {
                tracing::warn!(
                    conn_id,
                    servername = %conn.servername,
                    hash = %cert.hash,
                    "connection references a missing certificate"
                );
            }
            report.dangling_connections += 1;
            if !stats_only {
                db.remove_connection(*conn_id)?;
            }
        }
    }

    Ok(())
}

/// Collect blobs no connection references.
///
/// One referenced set is built up front, then each shard's stored digests are
/// streamed against it, so memory stays bounded by the referenced set plus a
/// single shard's digest list.
fn check_orphans(db: &CertDatabase, stats_only: bool, report: &mut RepairReport) -> CorpusResult<()> {
    let referenced = db.all_referenced_hashes()?;
    report.referenced_certificates = referenced.len() as u64;

    for shard in db.cert_store().shards() {
        let hashes = shard.hashes()?;
        report.stored_certificates += hashes.len() as u64;

        for hash in hashes {
            if !referenced.contains(&hash) {
                report.orphan_certificates += 1;
                if !stats_only {
                    shard.remove(&hash)?;
                }
            }
        }
    }

    tracing::info!(
        referenced = report.referenced_certificates,
        stored = report.stored_certificates,
        orphans = report.orphan_certificates,
        "certificate usage check done"
    );

    Ok(())
}
