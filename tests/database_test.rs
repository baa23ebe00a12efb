//! Integration tests for the certificate database and its repair pass

mod common;

use cert_corpus::hash::CertHash;
use cert_corpus::storage::{run_repair, CertDatabase, RepairOptions};

use common::{cert_bytes, chain, open_corpus};

#[test]
fn test_connection_roundtrip() {
    let (db, _dir) = open_corpus();
    let cert_a = cert_bytes(0xa0);
    let cert_b = cert_bytes(0xb0);

    let conn_id = db
        .insert_connection("example.com", 1000, &[cert_a.clone(), cert_b.clone()], false)
        .unwrap()
        .expect("first observation must create a connection");

    let conn = db.connection(conn_id).unwrap().unwrap();
    assert_eq!(conn.servername, "example.com");
    assert_eq!(conn.fetch_timestamp, 1000);
    assert!(!conn.leaf_only);
    assert_eq!(conn.certs.len(), 2);
    // wire order, leaf first, byte-for-byte
    assert_eq!(conn.certs[0].der.as_ref(), Some(&cert_a));
    assert_eq!(conn.certs[1].der.as_ref(), Some(&cert_b));
    assert_eq!(conn.certs[0].hash, CertHash::compute(&cert_a));
}

#[test]
fn test_corpus_survives_reopen() {
    let (db, dir) = open_corpus();
    let certs = chain(0x40, 3);
    let conn_id = db
        .insert_connection("keep.example", 2000, &certs, false)
        .unwrap()
        .unwrap();
    db.close().unwrap();

    let db = CertDatabase::open(dir.path()).unwrap();
    let conn = db.connection(conn_id).unwrap().unwrap();
    assert_eq!(conn.servername, "keep.example");
    for (stored, der) in conn.certs.iter().zip(&certs) {
        assert_eq!(stored.der.as_ref(), Some(der));
    }
}

#[test]
fn test_missing_blob_surfaces_as_none_not_error() {
    let (db, _dir) = open_corpus();
    let certs = chain(0x50, 2);
    let conn_id = db
        .insert_connection("gap.example", 1000, &certs, false)
        .unwrap()
        .unwrap();

    assert!(db.remove_certificate(&CertHash::compute(&certs[1])).unwrap());

    let conn = db.connection(conn_id).unwrap().unwrap();
    assert!(conn.certs[0].der.is_some());
    assert_eq!(conn.certs[1].der, None);
}

#[test]
fn test_repair_restores_referential_equality() {
    let (db, _dir) = open_corpus();

    // healthy connection
    let good = db
        .insert_connection("good.example", 1000, &chain(0x60, 2), false)
        .unwrap()
        .unwrap();

    // dangling connection: one of its blobs vanishes
    let broken_certs = chain(0x70, 2);
    let broken = db
        .insert_connection("broken.example", 1000, &broken_certs, false)
        .unwrap()
        .unwrap();
    db.remove_certificate(&CertHash::compute(&broken_certs[0])).unwrap();

    // orphan blob: stored but never referenced
    db.cert_store().insert(&cert_bytes(0xee)).unwrap();

    let report = run_repair(&db, &RepairOptions::default()).unwrap();
    assert_eq!(report.dangling_connections, 1);
    // the orphan plus whatever the removed connection left behind
    assert!(report.orphan_certificates >= 1);

    assert!(db.connection(good).unwrap().is_some());
    assert!(db.connection(broken).unwrap().is_none());

    // stored and referenced sets now coincide exactly
    let referenced = db.all_referenced_hashes().unwrap();
    let stored = db.cert_store().all_hashes().unwrap();
    assert_eq!(referenced, stored);
}

#[test]
fn test_stats_only_repair_modifies_nothing() {
    let (db, _dir) = open_corpus();

    let broken_certs = chain(0x80, 2);
    let broken = db
        .insert_connection("broken.example", 1000, &broken_certs, false)
        .unwrap()
        .unwrap();
    db.remove_certificate(&CertHash::compute(&broken_certs[0])).unwrap();
    db.cert_store().insert(&cert_bytes(0xef)).unwrap();

    let options = RepairOptions {
        stats_only: true,
        ..Default::default()
    };
    let report = run_repair(&db, &options).unwrap();
    assert_eq!(report.dangling_connections, 1);
    assert_eq!(report.orphan_certificates, 1);

    // everything is still in place
    assert!(db.connection(broken).unwrap().is_some());
    assert_eq!(db.certificate_count().unwrap(), 2);
    assert_eq!(db.connection_count().unwrap(), 1);
}

#[test]
fn test_repair_on_clean_corpus_finds_nothing() {
    let (db, _dir) = open_corpus();
    db.insert_connection("a.example", 1000, &chain(0x90, 3), false)
        .unwrap();

    let report = run_repair(&db, &RepairOptions::default()).unwrap();
    assert_eq!(report.connections_checked, 1);
    assert_eq!(report.dangling_connections, 0);
    assert_eq!(report.orphan_certificates, 0);
    assert_eq!(report.referenced_certificates, report.stored_certificates);
}
