//! Service assembly and graceful shutdown.
//!
//! [`Service`] opens nothing itself: the host hands it a store and a ledger
//! client, and it starts every background loop under one cancellation
//! token. Shutting down cancels the token and waits for each loop to
//! finish its current pass.

use std::{sync::Arc, time::Duration};

use cowallet_ledger::LedgerClient;
use cowallet_store::StorageEngine;
use cowallet_types::config::ServiceConfig;
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    api::Backend,
    jobs::JobRunner,
    maintenance::{Compactor, TtlReclaimer},
    outbox::OutboxPoller,
    payments::PaymentWatcher,
    sync::SyncEngine,
};

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}

/// The running background loops plus the request-facing backend.
pub struct Service {
    backend: Backend,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl Service {
    /// Starts every loop configured in `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        store: StorageEngine,
        ledger: Arc<dyn LedgerClient>,
        config: &ServiceConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let engine =
            Arc::new(SyncEngine::new(store.clone(), Arc::clone(&ledger), config.sync.page_size));

        let jobs = JobRunner::from_config(store.clone(), engine, &config.sync);
        let outbox = OutboxPoller::from_config(store.clone(), Arc::clone(&ledger), &config.outbox);
        let watcher = PaymentWatcher::builder()
            .store(store.clone())
            .ledger(ledger)
            .billing(config.billing.clone())
            .interval(config.outbox.tick)
            .max_backoff(config.outbox.max_backoff)
            .build();
        let reclaimer = TtlReclaimer::from_config(store.clone(), &config.storage);
        let compactor = Compactor::from_config(store.clone(), &config.storage);

        let tasks = vec![
            ("jobs", jobs.start(cancel.child_token())),
            ("outbox", outbox.start(cancel.child_token())),
            ("own_outputs", watcher.start(cancel.child_token())),
            ("ttl_reclaim", reclaimer.start(cancel.child_token())),
            ("compaction", compactor.start(cancel.child_token())),
        ];
        info!(tasks = tasks.len(), "Service started");

        Self {
            backend: Backend::from_config(store, &config.sync),
            cancel,
            tasks,
            shutdown_timeout: config.slowest_tick().max(Duration::from_secs(5)),
        }
    }

    /// The request-facing operations.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// A token cancelled when the service shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Stops every loop and waits for them to finish.
    ///
    /// A loop that does not stop within the slowest configured tick is
    /// abandoned with a warning.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.tasks {
            match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => warn!(task = name, error = %e, "Background task panicked"),
                Err(_) => warn!(task = name, "Background task did not stop in time"),
            }
        }
        info!("Service stopped");
    }

    /// Runs until `signal` completes, then shuts down.
    pub async fn run_until(self, signal: impl std::future::Future<Output = ()>) {
        let cancel = self.cancel.clone();
        tokio::select! {
            () = signal => {},
            () = cancel.cancelled() => {},
        }
        self.shutdown().await;
    }
}
