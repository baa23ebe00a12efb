// File: src/harvest/aggregator.rs

//! Aggregator task: sole writer for harvest results

use tokio::sync::mpsc;
use tracing::info;

use crate::bookkeeping::DomainStore;
use crate::error::CorpusResult;
use crate::probe::ProbeStatus;
use crate::storage::CertDatabase;

use super::worker::ProbeReport;

/// Running counters for one harvest, printed for the operator at the end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub processed: u64,
    pub ok: u64,
    pub nocert: u64,
    pub error: u64,
    pub timeout: u64,
    /// `Ok` reports that created a new connection row (duplicates excluded)
    pub connections_inserted: u64,
}

impl HarvestSummary {
    fn count(&mut self, status: ProbeStatus) {
        self.processed += 1;
        match status {
            ProbeStatus::Ok => self.ok += 1,
            ProbeStatus::NoCert => self.nocert += 1,
            ProbeStatus::Error => self.error += 1,
            ProbeStatus::Timeout => self.timeout += 1,
        }
    }
}

impl std::fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed {} hosts: {} ok, {} nocert, {} error, {} timeout; {} new connections",
            self.processed, self.ok, self.nocert, self.error, self.timeout,
            self.connections_inserted
        )
    }
}

/// Consume probe reports until the result queue closes.
///
/// This is the only task that writes to either store. Non-`Ok` reports move
/// `last_attempted_timet` and nothing else; `Ok` reports update the full
/// bookkeeping record and insert a connection (leaf_only = false, the probe
/// captures the whole presented chain). Both stores are flushed every
/// `commit_every` reports so a crash loses at most one batch.
pub async fn run_aggregator(
    mut report_rx: mpsc::Receiver<ProbeReport>,
    db: &CertDatabase,
    domains: &DomainStore,
    commit_every: usize,
) -> CorpusResult<HarvestSummary> {
    let mut summary = HarvestSummary::default();
    let mut since_flush = 0usize;

    while let Some(report) = report_rx.recv().await {
        match report.status {
            ProbeStatus::Ok => {
                domains.record_success(&report.servername, report.fetched_at)?;
                let inserted = db.insert_connection(
                    &report.servername,
                    report.fetched_at,
                    &report.certs,
                    false,
                )?;
                if inserted.is_some() {
                    summary.connections_inserted += 1;
                }
            }
            _ => {
                domains.record_attempt(&report.servername, report.fetched_at)?;
            }
        }
        summary.count(report.status);

        since_flush += 1;
        if since_flush >= commit_every {
            db.flush()?;
            domains.flush()?;
            info!(
                processed = summary.processed,
                ok = summary.ok,
                nocert = summary.nocert,
                error = summary.error,
                timeout = summary.timeout,
                connections = summary.connections_inserted,
                "Harvest progress"
            );
            since_flush = 0;
        }
    }

    // result queue closed: every worker is done
    db.flush()?;
    domains.flush()?;
    Ok(summary)
}
