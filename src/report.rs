//! Operator-facing output: connection dumps and full-corpus search

use chrono::{TimeZone, Utc};
use regex::RegexBuilder;

use crate::error::{CorpusError, CorpusResult};
use crate::hash::CertHash;
use crate::storage::{CertDatabase, ConnectionRecord};
use crate::x509;

/// One-line description of a connection, `now` being the current Unix time
pub fn connection_header(conn: &ConnectionRecord, now: i64) -> String {
    let fetched = match Utc.timestamp_opt(conn.fetch_timestamp, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", conn.fetch_timestamp),
    };
    let days_ago = (now - conn.fetch_timestamp) as f64 / 86400.0;
    let kinds = if conn.leaf_only {
        "only"
    } else {
        "and CA certificates"
    };
    format!(
        "Connection {} to {} fetched at {} UTC ({:.0} days ago), leaf certificates {} ({} certs)",
        conn.conn_id,
        conn.servername,
        fetched,
        days_ago,
        kinds,
        conn.certs.len()
    )
}

/// Print a connection header followed by each certificate in PEM form.
///
/// A certificate the store could not produce is called out but does not stop
/// the dump.
pub fn dump_connection(conn: &ConnectionRecord) {
    println!("{}", connection_header(conn, Utc::now().timestamp()));
    for cert in &conn.certs {
        match &cert.der {
            Some(der) => println!("{}", x509::to_pem(der).trim_end()),
            None => println!("No certificate present, error fetching it from storage."),
        }
    }
    println!();
}

/// Search every stored certificate's rendered text for `pattern`.
///
/// Scans shard by shard and stops at the first hit, printing its digest, PEM
/// and rendered text. Blobs the codec cannot render are skipped; the corpus
/// deliberately keeps undecodable junk that real servers presented.
pub async fn find_certificate(db: &CertDatabase, pattern: &str) -> CorpusResult<Option<CertHash>> {
    let regex = RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|e| CorpusError::InvalidPattern(e.to_string()))?;

    for shard in db.cert_store().shards() {
        for (hash, der) in shard.blobs()? {
            let text = match x509::render_text(&der).await {
                Ok(text) => text,
                Err(CorpusError::Codec(_)) => continue,
                Err(e) => return Err(e),
            };
            if regex.is_match(&text) {
                println!("{hash}");
                println!("{}", x509::to_pem(&der));
                println!("{text}");
                return Ok(Some(hash));
            }
        }
    }
    Ok(None)
}
