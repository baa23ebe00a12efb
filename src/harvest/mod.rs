// File: src/harvest/mod.rs

//! Concurrent certificate harvesting pipeline
//!
//! The pipeline is three stages over two bounded queues:
//! - a feeder task shuffles the candidate list into the work queue
//! - a pool of workers probes hosts and classifies the transcripts
//! - a single aggregator owns all database writes
//!
//! Shutdown rides on channel closure alone: the feeder drops the work
//! sender when the list is exhausted, each worker drops its report sender
//! when the work queue drains, and the aggregator stops when the report
//! queue closes. Every hostname fed produces exactly one aggregated result.

pub mod aggregator;
pub mod config;
pub mod feeder;
pub mod worker;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::bookkeeping::DomainStore;
use crate::error::CorpusResult;
use crate::probe::Prober;
use crate::storage::CertDatabase;

pub use aggregator::HarvestSummary;
pub use config::HarvestConfig;
pub use worker::ProbeReport;

/// Run one harvest over `candidates` and return the final counters.
///
/// The aggregator runs on this task and borrows both stores; feeder and
/// workers are spawned. Worker panics surface here as errors after the
/// aggregator has drained whatever reports still arrived.
pub async fn run(
    db: &CertDatabase,
    domains: &DomainStore,
    candidates: Vec<String>,
    config: &HarvestConfig,
    prober: Arc<dyn Prober>,
) -> CorpusResult<HarvestSummary> {
    info!(
        candidates = candidates.len(),
        workers = config.workers,
        queue_depth = config.queue_depth,
        limit = ?config.limit,
        "Harvest starting"
    );

    let (work_tx, work_rx) = async_channel::bounded::<String>(config.queue_depth);
    let (report_tx, report_rx) = mpsc::channel(config.queue_depth);

    let feeder_handle = tokio::spawn(feeder::run_feeder(candidates, config.limit, work_tx));

    let mut worker_handles = Vec::with_capacity(config.workers);
    for worker_id in 0..config.workers {
        worker_handles.push(tokio::spawn(worker::run_worker(
            worker_id,
            work_rx.clone(),
            report_tx.clone(),
            Arc::clone(&prober),
        )));
    }

    // the spawned tasks hold the only clones that matter now
    drop(work_rx);
    drop(report_tx);

    let summary = aggregator::run_aggregator(report_rx, db, domains, config.commit_every).await?;

    let fed = feeder_handle.await?;
    for handle in worker_handles {
        handle.await?;
    }

    info!(fed, processed = summary.processed, "Harvest finished");
    Ok(summary)
}
