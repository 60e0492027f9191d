//! Range scan and expiry behavior against a real database file.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use cowallet_store::{KeyFamily, ReadableStore, Scan, StorageEngine};
use cowallet_test_utils::TestDir;

fn engine(dir: &TestDir) -> StorageEngine {
    StorageEngine::open(dir.join("store.redb")).expect("open store")
}

fn seed(engine: &StorageEngine, family: KeyFamily, seqs: &[u64]) {
    let mut txn = engine.begin_write().unwrap();
    for seq in seqs {
        let key = family.key(&(*seq,)).unwrap();
        txn.set(&key, &seq.to_be_bytes()).unwrap();
    }
    txn.commit().unwrap();
}

fn seqs(entries: &[cowallet_store::Entry], family: KeyFamily) -> Vec<u64> {
    entries.iter().map(|e| family.decode::<(u64,)>(&e.key).unwrap().0).collect()
}

#[test]
fn forward_scan_stays_inside_prefix() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    seed(&engine, KeyFamily::Log, &[3, 1, 2]);
    seed(&engine, KeyFamily::Property, &[9]);

    let txn = engine.begin_read().unwrap();
    let entries = txn.scan(&Scan::prefix(&KeyFamily::Log.prefix())).unwrap();
    assert_eq!(seqs(&entries, KeyFamily::Log), vec![1, 2, 3]);
}

#[test]
fn reverse_scan_with_seek_and_limit() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    seed(&engine, KeyFamily::Log, &[10, 20, 30, 40]);

    let txn = engine.begin_read().unwrap();
    let prefix = KeyFamily::Log.prefix();
    let seek = KeyFamily::Log.key(&(30u64,)).unwrap();

    let entries = txn.scan(&Scan::prefix(&prefix).seek(&seek).reverse()).unwrap();
    assert_eq!(seqs(&entries, KeyFamily::Log), vec![20, 10]);

    let newest = txn.scan(&Scan::prefix(&prefix).reverse().limit(2)).unwrap();
    assert_eq!(seqs(&newest, KeyFamily::Log), vec![40, 30]);
}

#[test]
fn forward_seek_is_inclusive() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    seed(&engine, KeyFamily::Log, &[1, 2, 3]);

    let txn = engine.begin_read().unwrap();
    let prefix = KeyFamily::Log.prefix();
    let seek = KeyFamily::Log.key(&(2u64,)).unwrap();
    let entries = txn.scan(&Scan::prefix(&prefix).seek(&seek)).unwrap();
    assert_eq!(seqs(&entries, KeyFamily::Log), vec![2, 3]);
}

#[test]
fn expired_entries_are_invisible_then_purged() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    let key = KeyFamily::Job.key(&(1u64,)).unwrap();
    let start = Utc::now();

    {
        let mut txn = engine.begin_write().unwrap().as_of(start);
        txn.set_with_ttl(&key, b"job", Duration::from_secs(60)).unwrap();
        txn.commit().unwrap();
    }

    let before = engine.begin_read().unwrap().as_of(start + TimeDelta::seconds(59));
    assert_eq!(before.get(&key).unwrap(), Some(b"job".to_vec()));
    let listed = before.scan(&Scan::prefix(&KeyFamily::Job.prefix())).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].expires_at.is_some());
    drop(before);

    let after = start + TimeDelta::seconds(61);
    let reader = engine.begin_read().unwrap().as_of(after);
    assert_eq!(reader.get(&key).unwrap(), None);
    assert!(reader.scan(&Scan::prefix(&KeyFamily::Job.prefix())).unwrap().is_empty());
    drop(reader);

    let mut txn = engine.begin_write().unwrap().as_of(after);
    assert_eq!(txn.purge_expired(&KeyFamily::Job.prefix(), 100).unwrap(), 1);
    txn.commit().unwrap();

    let mut txn = engine.begin_write().unwrap().as_of(after);
    assert_eq!(txn.purge_expired(&KeyFamily::Job.prefix(), 100).unwrap(), 0);
    txn.discard().unwrap();
}

#[test]
fn purge_stops_at_the_limit_and_skips_live_entries() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    let start = Utc::now();

    {
        let mut txn = engine.begin_write().unwrap().as_of(start);
        for n in 1..=6u64 {
            let key = KeyFamily::Job.key(&(n,)).unwrap();
            // Odd keys outlive the purge below.
            let ttl = if n % 2 == 1 { 3600 } else { 10 };
            txn.set_with_ttl(&key, b"job", Duration::from_secs(ttl)).unwrap();
        }
        txn.commit().unwrap();
    }

    let later = start + TimeDelta::seconds(60);
    let mut txn = engine.begin_write().unwrap().as_of(later);
    assert_eq!(txn.purge_expired(&KeyFamily::Job.prefix(), 2).unwrap(), 2);
    assert_eq!(txn.purge_expired(&KeyFamily::Job.prefix(), 0).unwrap(), 0);
    txn.commit().unwrap();

    let raw = engine.begin_read().unwrap().as_of(start);
    let left = raw.scan(&Scan::prefix(&KeyFamily::Job.prefix())).unwrap();
    assert_eq!(seqs(&left, KeyFamily::Job), vec![1, 3, 5, 6], "lowest expired keys go first");
    drop(raw);

    let mut txn = engine.begin_write().unwrap().as_of(later);
    assert_eq!(txn.purge_expired(&KeyFamily::Job.prefix(), 100).unwrap(), 1);
    txn.commit().unwrap();
    let live = engine.begin_read().unwrap().as_of(later);
    let left = live.scan(&Scan::prefix(&KeyFamily::Job.prefix())).unwrap();
    assert_eq!(seqs(&left, KeyFamily::Job), vec![1, 3, 5]);
}

#[test]
fn rewriting_a_ttl_entry_extends_it() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    let key = KeyFamily::Job.key(&(7u64,)).unwrap();
    let start = Utc::now();

    for offset in [0, 50] {
        let mut txn = engine.begin_write().unwrap().as_of(start + TimeDelta::seconds(offset));
        txn.set_with_ttl(&key, b"job", Duration::from_secs(60)).unwrap();
        txn.commit().unwrap();
    }

    let reader = engine.begin_read().unwrap().as_of(start + TimeDelta::seconds(100));
    assert!(reader.contains(&key).unwrap());
}

#[test]
fn discarded_write_leaves_no_trace() {
    let dir = TestDir::new();
    let engine = engine(&dir);

    let mut txn = engine.begin_write().unwrap();
    txn.set(b"p\x01", b"x").unwrap();
    assert!(txn.contains(b"p\x01").unwrap());
    txn.discard().unwrap();

    let reader = engine.begin_read().unwrap();
    assert!(!reader.contains(b"p\x01").unwrap());
}

#[test]
fn reader_snapshot_is_isolated_from_later_commit() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    let reader = engine.begin_read().unwrap();

    let mut txn = engine.begin_write().unwrap();
    txn.set(b"p\x02", b"y").unwrap();
    txn.commit().unwrap();

    assert!(!reader.contains(b"p\x02").unwrap());
    assert!(engine.begin_read().unwrap().contains(b"p\x02").unwrap());
}

#[test]
fn delete_reports_live_removal() {
    let dir = TestDir::new();
    let engine = engine(&dir);
    seed(&engine, KeyFamily::Log, &[5]);
    let key = KeyFamily::Log.key(&(5u64,)).unwrap();

    let mut txn = engine.begin_write().unwrap();
    assert!(txn.delete(&key).unwrap());
    assert!(!txn.delete(&key).unwrap());
    txn.commit().unwrap();
}

mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn scans_return_sorted_unique_keys(
            values in proptest::collection::vec(any::<u64>(), 0..40),
            limit in 1usize..50,
        ) {
            let engine = StorageEngine::open_in_memory().unwrap();
            seed(&engine, KeyFamily::Log, &values);

            let mut expected = values.clone();
            expected.sort_unstable();
            expected.dedup();

            let txn = engine.begin_read().unwrap();
            let prefix = KeyFamily::Log.prefix();
            let forward = txn.scan(&Scan::prefix(&prefix)).unwrap();
            prop_assert_eq!(seqs(&forward, KeyFamily::Log), expected.clone());

            let reverse = txn.scan(&Scan::prefix(&prefix).reverse().limit(limit)).unwrap();
            let newest: Vec<u64> = expected.iter().rev().take(limit).copied().collect();
            prop_assert_eq!(seqs(&reverse, KeyFamily::Log), newest);
        }
    }
}
