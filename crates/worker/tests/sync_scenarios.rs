//! Sync engine behaviour against the in-memory ledger.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::sync::Arc;

use cowallet_ledger::{LedgerClient, MockLedger, OutputState};
use cowallet_state::{JobStore, SnapshotQuery, SnapshotStore, VaultStore};
use cowallet_store::StorageEngine;
use cowallet_test_utils::fixtures::{amount, asset, user, vault};
use cowallet_types::{ErrorKind, Snapshot, Vault, VaultAddress};
use cowallet_worker::{JobRunner, SyncEngine};
use rust_decimal::Decimal;

struct Harness {
    ledger: Arc<MockLedger>,
    store: StorageEngine,
    engine: SyncEngine,
}

fn harness(page_size: usize) -> Harness {
    let ledger = Arc::new(MockLedger::new(user(900)));
    let store = StorageEngine::open_in_memory().unwrap();
    let client: Arc<dyn LedgerClient> = ledger.clone();
    let engine = SyncEngine::new(store.clone(), client, page_size);
    Harness { ledger, store, engine }
}

impl Harness {
    fn vault(&self, address: &VaultAddress) -> Vault {
        let read = self.store.begin_read().unwrap();
        VaultStore::find(&read, address).unwrap()
    }

    fn snapshots(&self, address: &VaultAddress, query: SnapshotQuery) -> Vec<Snapshot> {
        let read = self.store.begin_read().unwrap();
        SnapshotStore::list(&read, address.vault_id(), &query).unwrap()
    }
}

#[tokio::test]
async fn test_first_deposit() {
    let h = harness(500);
    let address = vault(&[1, 2, 3], 2);
    let deposit = h.ledger.deposit(&address, asset(1), amount("10"));

    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.outputs, 1);
    assert_eq!(outcome.snapshots, 1);
    assert_eq!(outcome.offset, deposit.sequence);

    let stored = h.vault(&address);
    assert_eq!(stored.offset, deposit.sequence);
    assert_eq!(stored.assets.len(), 1);
    assert_eq!(stored.assets[0].id, asset(1));
    assert_eq!(stored.assets[0].balance, amount("10"));
    assert_eq!(stored.assets[0].unspent, amount("10"));
    assert_eq!(stored.assets[0].signed, Decimal::ZERO);

    let snapshots = h.snapshots(&address, SnapshotQuery::default());
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].id, deposit.output_id);
    assert_eq!(snapshots[0].amount, amount("10"));

    let read = h.store.begin_read().unwrap();
    let listed = VaultStore::list_for_user(&read, user(2)).unwrap();
    assert_eq!(listed, vec![stored]);
}

#[tokio::test]
async fn test_new_deposit_behind_pinned_cursor_is_written() {
    let h = harness(500);
    let address = vault(&[1, 3], 1);
    let first = h.ledger.deposit(&address, asset(1), amount("100"));
    h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(h.vault(&address).offset, first.sequence);

    // The first deposit is still unspent, so the offset cannot move.
    h.ledger.deposit(&address, asset(1), amount("5"));
    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.offset, first.sequence);
    assert!(outcome.written);
    assert_eq!(outcome.snapshots, 1);

    let stored = h.vault(&address);
    assert_eq!(stored.offset, first.sequence);
    assert_eq!(stored.assets[0].unspent, amount("105"));
    assert_eq!(h.snapshots(&address, SnapshotQuery::default()).len(), 2);

    let replay = h.engine.sync_vault(&address).await.unwrap();
    assert!(!replay.written);
    assert_eq!(replay.snapshots, 0);
}

#[tokio::test]
async fn test_sign_then_spend() {
    let h = harness(500);
    let address = vault(&[1, 2], 2);
    let recipient = vault(&[5], 1);
    let deposit = h.ledger.deposit(&address, asset(1), amount("10"));
    h.engine.sync_vault(&address).await.unwrap();

    let signer_ref = h.ledger.sign(&[deposit.output_id], &recipient, amount("10"));
    let signed = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(signed.snapshots, 0, "signing moves no value");
    let stored = h.vault(&address);
    assert_eq!(stored.assets[0].balance, amount("10"));
    assert_eq!(stored.assets[0].unspent, Decimal::ZERO);
    assert_eq!(stored.assets[0].signed, amount("10"));
    assert_eq!(stored.assets[0].requests, vec![signer_ref.clone()]);

    h.ledger.spend(&signer_ref);
    let spent_seq = h.ledger.output(deposit.output_id).unwrap().sequence;
    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.snapshots, 1);
    assert_eq!(outcome.offset, spent_seq + 1);

    let stored = h.vault(&address);
    assert!(stored.assets.is_empty(), "nothing live remains");
    let snapshots = h.snapshots(&address, SnapshotQuery::default());
    assert_eq!(snapshots.len(), 2);
    let outbound: Vec<_> = snapshots.iter().filter(|s| s.amount.is_sign_negative()).collect();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].amount, amount("-10"));

    // The recipient's side is an ordinary inbound output.
    let received = h.engine.sync_vault(&recipient).await.unwrap();
    assert_eq!(received.snapshots, 1);
    assert_eq!(h.vault(&recipient).assets[0].unspent, amount("10"));
}

#[tokio::test]
async fn test_unpriced_request_is_priced_from_its_output() {
    let h = harness(500);
    let address = vault(&[1], 1);
    let deposit = h.ledger.deposit(&address, asset(1), amount("7.5"));
    let signer_ref = h.ledger.sign(&[deposit.output_id], &vault(&[9], 1), amount("7.5"));
    h.ledger.unprice(&signer_ref);
    h.ledger.spend(&signer_ref);

    h.engine.sync_vault(&address).await.unwrap();
    let snapshots = h.snapshots(&address, SnapshotQuery::default());
    let outbound: Vec<_> = snapshots.iter().filter(|s| s.amount.is_sign_negative()).collect();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].amount, amount("-7.5"));
}

#[tokio::test]
async fn test_spent_outputs_of_one_request_yield_one_snapshot() {
    let h = harness(500);
    let address = vault(&[1, 2], 1);
    let a = h.ledger.deposit(&address, asset(1), amount("3"));
    let b = h.ledger.deposit(&address, asset(1), amount("4"));
    let signer_ref = h.ledger.sign(&[a.output_id, b.output_id], &vault(&[7], 1), amount("7"));
    h.ledger.spend(&signer_ref);

    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.snapshots, 3, "two inbound plus one outbound");
    let outbound: Vec<_> = h
        .snapshots(&address, SnapshotQuery::default())
        .into_iter()
        .filter(|s| s.amount.is_sign_negative())
        .collect();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].amount, amount("-7"));
}

#[tokio::test]
async fn test_change_counts_toward_totals_without_a_snapshot() {
    let h = harness(500);
    let address = vault(&[1, 2], 2);
    h.ledger.deposit(&address, asset(1), amount("10"));
    h.ledger.change(&address, asset(1), amount("2"));

    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.outputs, 2);
    assert_eq!(outcome.snapshots, 1);
    assert_eq!(h.vault(&address).assets[0].unspent, amount("12"));
}

#[tokio::test]
async fn test_pagination_reads_every_page() {
    let h = harness(2);
    let address = vault(&[4], 1);
    for n in 1..=5u64 {
        h.ledger.deposit(&address, asset(u128::from(n % 2)), Decimal::from(n));
    }

    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.outputs, 5);
    assert_eq!(outcome.snapshots, 5);
    assert!(h.ledger.list_count() >= 3);

    let stored = h.vault(&address);
    assert_eq!(stored.assets.len(), 2);
    assert!(stored.assets.windows(2).all(|w| w[0].id < w[1].id), "assets ordered by id");
    let total: Decimal = stored.assets.iter().map(|a| a.unspent).sum();
    assert_eq!(total, Decimal::from(15));
}

#[tokio::test]
async fn test_replay_is_idempotent_and_offset_never_regresses() {
    let h = harness(500);
    let address = vault(&[1, 2], 2);
    let first = h.ledger.deposit(&address, asset(1), amount("1"));
    h.ledger.deposit(&address, asset(2), amount("2"));

    let synced = h.engine.sync_vault(&address).await.unwrap();
    assert!(synced.written);
    let before = h.vault(&address);

    let replay = h.engine.sync_vault(&address).await.unwrap();
    assert!(!replay.written);
    assert_eq!(replay.snapshots, 0);
    assert_eq!(h.vault(&address), before);

    // Spending the oldest output moves the lowest live sequence up.
    let signer_ref = h.ledger.sign(&[first.output_id], &vault(&[8], 1), amount("1"));
    h.ledger.spend(&signer_ref);
    let mut offsets = vec![before.offset];
    for _ in 0..3 {
        offsets.push(h.engine.sync_vault(&address).await.unwrap().offset);
    }
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "offsets {offsets:?}");
    assert_eq!(h.snapshots(&address, SnapshotQuery::default()).len(), 3);
}

#[tokio::test]
async fn test_snapshot_indexes_agree() {
    let h = harness(500);
    let address = vault(&[1, 2], 2);
    for n in 0..6u32 {
        h.ledger.deposit(&address, asset(u128::from(n % 3)), Decimal::from(n + 1));
        h.ledger.advance(chrono::TimeDelta::seconds(10));
    }
    h.engine.sync_vault(&address).await.unwrap();

    let all = h.snapshots(&address, SnapshotQuery::default());
    assert_eq!(all.len(), 6);
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at), "newest first");

    let mut by_asset = 0;
    for n in 0..3 {
        let query = SnapshotQuery { asset: Some(asset(n)), ..SnapshotQuery::default() };
        let page = h.snapshots(&address, query);
        assert!(page.iter().all(|s| s.asset_id == asset(n)));
        by_asset += page.len();
    }
    assert_eq!(by_asset, all.len());

    let cutoff = all[2].created_at;
    let query = SnapshotQuery { before: Some(cutoff), limit: 2, ..SnapshotQuery::default() };
    let older = h.snapshots(&address, query);
    assert_eq!(older.len(), 2);
    assert!(older.iter().all(|s| s.created_at < cutoff));

    let read = h.store.begin_read().unwrap();
    for snapshot in &all {
        assert_eq!(SnapshotStore::get(&read, snapshot.id).unwrap().as_ref(), Some(snapshot));
    }
}

#[tokio::test]
async fn test_transient_failure_leaves_state_untouched() {
    let h = harness(500);
    let address = vault(&[1, 2], 2);
    h.ledger.deposit(&address, asset(1), amount("10"));
    h.ledger.inject_unavailable(1);

    let err = h.engine.sync_vault(&address).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    let read = h.store.begin_read().unwrap();
    assert!(VaultStore::get(&read, address.vault_id()).unwrap().is_none());
    drop(read);

    let outcome = h.engine.sync_vault(&address).await.unwrap();
    assert_eq!(outcome.snapshots, 1);
}

#[tokio::test]
async fn test_runner_syncs_every_queued_vault() {
    let h = harness(500);
    let engine = Arc::new(h.engine);
    let runner = JobRunner::builder().store(h.store.clone()).engine(Arc::clone(&engine)).build();

    let vaults = [vault(&[1], 1), vault(&[2, 3], 2), vault(&[4, 5, 6], 2)];
    let mut txn = h.store.begin_write().unwrap();
    for (n, address) in vaults.iter().enumerate() {
        h.ledger.deposit(address, asset(1), Decimal::from(n + 1));
        JobStore::enqueue(&mut txn, user(1), address, std::time::Duration::from_secs(600))
            .unwrap();
    }
    txn.commit().unwrap();

    let cycle = runner.run_cycle().await.unwrap();
    assert_eq!(cycle.jobs, 3);
    assert_eq!(cycle.failed, 0);

    let read = h.store.begin_read().unwrap();
    for address in &vaults {
        let stored = VaultStore::find(&read, address).unwrap();
        assert_eq!(stored.assets.len(), 1);
        assert_eq!(
            h.ledger.outputs_of(address)[0].state,
            OutputState::Unspent,
            "sync never changes the ledger"
        );
    }
    // Jobs stay queued until their TTL lapses.
    assert_eq!(JobStore::list(&read, 10).unwrap().len(), 3);
}
