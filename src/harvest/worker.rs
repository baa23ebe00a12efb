// File: src/harvest/worker.rs

//! Probe workers: drain the work queue, classify transcripts, report results

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::probe::{ProbeRaw, ProbeStatus, Prober};
use crate::x509;

/// One classified probe result, ready for the aggregator
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub servername: String,
    /// Unix timestamp taken when the probe completed
    pub fetched_at: i64,
    pub status: ProbeStatus,
    /// Captured chain in wire order, leaf first; empty unless status is `Ok`
    pub certs: Vec<Vec<u8>>,
}

/// Worker loop: probe hostnames from the work queue until it closes.
///
/// Every probe-level failure becomes a result code; nothing escapes the loop
/// as an error. The worker's clone of the report sender drops on return,
/// which is how the aggregator learns the pool has drained.
pub async fn run_worker(
    worker_id: usize,
    work_rx: async_channel::Receiver<String>,
    report_tx: mpsc::Sender<ProbeReport>,
    prober: Arc<dyn Prober>,
) {
    while let Ok(servername) = work_rx.recv().await {
        let (status, certs) = probe_one(prober.as_ref(), &servername).await;
        debug!(worker_id, servername = %servername, status = %status, "Probe finished");

        let report = ProbeReport {
            servername,
            fetched_at: Utc::now().timestamp(),
            status,
            certs,
        };
        if report_tx.send(report).await.is_err() {
            // aggregator is gone; nothing left to report to
            break;
        }
    }
    debug!(worker_id, "Worker finished");
}

/// Run one probe and classify its outcome.
///
/// A nonzero exit is `Error` even if certificates made it into the transcript;
/// a transcript without certificates is `NoCert`, not an error (plain-TCP
/// services answer the connect and then say nothing useful).
async fn probe_one(prober: &dyn Prober, servername: &str) -> (ProbeStatus, Vec<Vec<u8>>) {
    match prober.probe(servername).await {
        Ok(ProbeRaw::TimedOut) => (ProbeStatus::Timeout, Vec::new()),
        Ok(ProbeRaw::Exited { success: false, .. }) => (ProbeStatus::Error, Vec::new()),
        Ok(ProbeRaw::Exited { success: true, output }) => {
            let certs = x509::extract_certificates(&output);
            if certs.is_empty() {
                (ProbeStatus::NoCert, Vec::new())
            } else {
                (ProbeStatus::Ok, certs)
            }
        }
        Err(e) => {
            debug!(servername, error = %e, "Probe subprocess failed to start");
            (ProbeStatus::Error, Vec::new())
        }
    }
}
