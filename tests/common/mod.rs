//! Shared fixtures for the integration tests

use cert_corpus::storage::CertDatabase;
use tempfile::TempDir;

/// Deterministic pseudo-DER bytes, distinct per tag
pub fn cert_bytes(tag: u8) -> Vec<u8> {
    let mut der = vec![0x30, 0x82, tag, 0x4c];
    der.extend((0u8..48).map(|i| tag.wrapping_mul(31).wrapping_add(i)));
    der
}

/// A chain of `len` distinct certificates, leaf first
pub fn chain(first_tag: u8, len: usize) -> Vec<Vec<u8>> {
    (0..len)
        .map(|i| cert_bytes(first_tag.wrapping_add(i as u8)))
        .collect()
}

/// Fresh on-disk corpus in a temp directory
pub fn open_corpus() -> (CertDatabase, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let db = CertDatabase::open(dir.path()).expect("Failed to open corpus");
    (db, dir)
}
