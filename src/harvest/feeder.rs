// File: src/harvest/feeder.rs

//! Feeder task: pushes candidate hostnames into the work queue

use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::debug;

/// Shuffle the candidate list and feed it into the work queue.
///
/// Candidate lists tend to arrive sorted (alphabetical exports, rank-ordered
/// toplists), which would hammer related hosts back to back; shuffling spreads
/// the load and decorrelates failures. At most `limit` hostnames are sent.
///
/// Dropping the sender on return closes the queue, which is what tells the
/// workers to finish. Returns the number of hostnames actually fed.
pub async fn run_feeder(
    mut candidates: Vec<String>,
    limit: Option<usize>,
    work_tx: async_channel::Sender<String>,
) -> usize {
    candidates.shuffle(&mut thread_rng());
    if let Some(limit) = limit {
        candidates.truncate(limit);
    }

    let mut fed = 0usize;
    for servername in candidates {
        if work_tx.send(servername).await.is_err() {
            // every worker is gone already
            break;
        }
        fed += 1;
    }

    debug!(fed, "Feeder finished");
    fed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_feeder_sends_everything_then_closes() {
        let names = hosts(&["a.example", "b.example", "c.example", "d.example"]);
        let (tx, rx) = async_channel::bounded(16);

        let fed = run_feeder(names.clone(), None, tx).await;
        assert_eq!(fed, 4);

        let mut seen = HashSet::new();
        while let Ok(name) = rx.recv().await {
            seen.insert(name);
        }
        // channel closed after the drain; same set, possibly different order
        assert_eq!(seen, names.into_iter().collect::<HashSet<_>>());
        assert!(rx.is_closed());
    }

    #[tokio::test]
    async fn test_feeder_applies_limit() {
        let names = hosts(&["a", "b", "c", "d", "e", "f"]);
        let (tx, rx) = async_channel::bounded(16);

        let fed = run_feeder(names, Some(2), tx).await;
        assert_eq!(fed, 2);

        let mut drained = 0;
        while rx.recv().await.is_ok() {
            drained += 1;
        }
        assert_eq!(drained, 2);
    }

    #[tokio::test]
    async fn test_feeder_with_empty_list() {
        let (tx, rx) = async_channel::bounded::<String>(1);
        let fed = run_feeder(Vec::new(), None, tx).await;
        assert_eq!(fed, 0);
        assert!(rx.recv().await.is_err());
    }
}
