//! The assembled service, driven only through its backend and the ledger.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use cowallet_ledger::{LedgerClient, MockLedger};
use cowallet_store::StorageEngine;
use cowallet_test_utils::{
    TestDir, assert_eventually,
    fixtures::{amount, asset, user, vault},
};
use cowallet_types::config::{BillingConfig, OutboxConfig, ServiceConfig, StorageConfig, SyncConfig};
use cowallet_worker::Service;

fn config(dir: &TestDir) -> ServiceConfig {
    let tick = Duration::from_millis(20);
    let backoff = Duration::from_millis(200);
    ServiceConfig::builder()
        .storage(StorageConfig::builder().path(dir.store_path()).build().unwrap())
        .sync(SyncConfig::builder().tick(tick).max_backoff(backoff).build().unwrap())
        .outbox(OutboxConfig::builder().tick(tick).max_backoff(backoff).build().unwrap())
        .billing(
            BillingConfig::builder()
                .pay_asset_id(asset(1))
                .pay_amount(amount("10"))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_payment_renews_then_sync_picks_up_deposits() {
    let dir = TestDir::new();
    let config = config(&dir);
    let ledger = Arc::new(MockLedger::new(user(900)));
    ledger.set_now(Utc::now());

    let service_vault = ledger.service_address();
    let target = vault(&[1, 2], 2);
    ledger.deposit(&service_vault, asset(2), amount("1"));
    let memo = target.to_string();
    ledger.transfer(&service_vault, Some(&vault(&[3], 1)), asset(1), amount("10"), memo.as_bytes());

    let store = StorageEngine::open(&config.storage.path).unwrap();
    let client: Arc<dyn LedgerClient> = ledger.clone();
    let service = Service::start(store, client, &config);
    let backend = service.backend().clone();

    let renewed = assert_eventually(Duration::from_secs(5), || {
        backend.vault_expiry(&target).ok().flatten().is_some()
    })
    .await;
    assert!(renewed, "payment should renew the vault through the relay");

    ledger.deposit(&target, asset(3), amount("4.2"));
    assert!(backend.enqueue_sync(user(1), &target, Utc::now()).unwrap().is_some());
    let synced = assert_eventually(Duration::from_secs(5), || {
        backend
            .find_vault(&target)
            .is_ok_and(|found| found.assets.iter().any(|a| a.unspent == amount("4.2")))
    })
    .await;
    assert!(synced, "queued job should sync the deposit");

    tokio::time::timeout(Duration::from_secs(10), service.shutdown()).await.unwrap();
}
