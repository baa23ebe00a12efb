//! Integration tests for the sharded certificate store

mod common;

use std::collections::HashSet;

use cert_corpus::hash::CertHash;
use cert_corpus::storage::{shard_path, ShardedCertStore, SHARD_COUNT};
use tempfile::tempdir;

use common::cert_bytes;

#[test]
fn test_roundtrip_byte_for_byte() {
    let dir = tempdir().unwrap();
    let store = ShardedCertStore::open(dir.path()).unwrap();

    let der = cert_bytes(0x11);
    let (hash, created) = store.insert(&der).unwrap();
    assert!(created);
    assert_eq!(hash, CertHash::compute(&der));
    assert_eq!(store.get(&hash).unwrap(), Some(der));
}

#[test]
fn test_duplicate_insert_stores_one_blob() {
    let dir = tempdir().unwrap();
    let store = ShardedCertStore::open(dir.path()).unwrap();

    let der = cert_bytes(0x22);
    let (first_hash, first_created) = store.insert(&der).unwrap();
    let (second_hash, second_created) = store.insert(&der).unwrap();

    assert_eq!(first_hash, second_hash);
    assert!(first_created);
    assert!(!second_created);
    assert_eq!(store.total_count().unwrap(), 1);
}

#[test]
fn test_all_shard_files_exist_on_disk() {
    let dir = tempdir().unwrap();
    let _store = ShardedCertStore::open(dir.path()).unwrap();

    for index in 0..SHARD_COUNT {
        let path = shard_path(dir.path(), index);
        assert!(path.exists(), "missing shard file {}", path.display());
    }
    assert_eq!(shard_path(dir.path(), 0x3a).file_name().unwrap(), "3a.sqlite3");
}

#[test]
fn test_blobs_survive_reopen() {
    let dir = tempdir().unwrap();
    let ders: Vec<Vec<u8>> = (0..20).map(cert_bytes).collect();

    let mut hashes = Vec::new();
    {
        let store = ShardedCertStore::open(dir.path()).unwrap();
        for der in &ders {
            let (hash, _) = store.insert(der).unwrap();
            hashes.push(hash);
        }
        store.flush().unwrap();
    }

    let store = ShardedCertStore::open(dir.path()).unwrap();
    assert_eq!(store.total_count().unwrap(), 20);
    for (der, hash) in ders.iter().zip(&hashes) {
        assert_eq!(store.get(hash).unwrap().as_ref(), Some(der));
    }
}

#[test]
fn test_enumeration_matches_inserts() {
    let dir = tempdir().unwrap();
    let store = ShardedCertStore::open(dir.path()).unwrap();

    let expected: HashSet<CertHash> = (0..50)
        .map(|i| store.insert(&cert_bytes(i)).unwrap().0)
        .collect();

    assert_eq!(store.all_hashes().unwrap(), expected);
}

#[test]
fn test_removed_blob_is_gone() {
    let dir = tempdir().unwrap();
    let store = ShardedCertStore::open(dir.path()).unwrap();

    let (hash, _) = store.insert(&cert_bytes(0x33)).unwrap();
    assert!(store.remove(&hash).unwrap());
    assert_eq!(store.get(&hash).unwrap(), None);
    assert!(!store.remove(&hash).unwrap());
    assert_eq!(store.total_count().unwrap(), 0);
}
