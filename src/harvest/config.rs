// File: src/harvest/config.rs

//! Harvest run configuration

use std::time::Duration;

/// Configuration for one harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Number of concurrent probe workers
    pub workers: usize,

    /// Capacity of the work and result queues (backpressure threshold)
    pub queue_depth: usize,

    /// Deadline for a single probe subprocess
    pub probe_timeout: Duration,

    /// TLS port probed on every host
    pub port: u16,

    /// Hosts attempted more recently than this are not re-fed
    pub max_age: Duration,

    /// Cap on the number of hosts fed into the queue (None = whole list)
    pub limit: Option<usize>,

    /// Reports between periodic flushes of both stores
    pub commit_every: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            queue_depth: 100,
            probe_timeout: Duration::from_secs(15),
            port: 443,
            max_age: Duration::from_secs(365 * 24 * 60 * 60),
            limit: None,
            commit_every: 2500,
        }
    }
}
