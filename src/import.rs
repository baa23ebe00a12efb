//! Seeding the domain list from ranked CSV exports

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::bookkeeping::DomainStore;
use crate::error::CorpusResult;

/// Counters from one CSV import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Non-empty lines read
    pub lines: u64,
    /// Domains newly added to the list
    pub added: u64,
    /// Lines that were not `rank,domain` shaped
    pub malformed: u64,
}

/// Import one `rank,domain` CSV file into the domain list.
///
/// Toplist exports put the domain in the second field. Lines that do not
/// split into exactly two fields are counted as malformed and skipped.
/// Domains already in the list keep their scheduling state untouched.
pub fn import_csv(domains: &DomainStore, path: &Path) -> CorpusResult<ImportOutcome> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut outcome = ImportOutcome::default();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        outcome.lines += 1;

        let fields: Vec<&str> = line.split(',').collect();
        let domainname = match fields.as_slice() {
            [_rank, domain] if !domain.trim().is_empty() => domain.trim(),
            _ => {
                outcome.malformed += 1;
                continue;
            }
        };

        if domains.add_candidate(domainname)? {
            outcome.added += 1;
        }
    }

    debug!(
        path = %path.display(),
        lines = outcome.lines,
        added = outcome.added,
        malformed = outcome.malformed,
        "CSV import finished"
    );
    Ok(outcome)
}
