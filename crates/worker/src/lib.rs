//! Background processing for the cowallet backend.
//!
//! This crate runs everything that talks to the ledger:
//!
//! - [`SyncEngine`] folds a vault's ledger outputs into snapshots, asset
//!   totals, and a resumable offset
//! - [`JobRunner`] drains the sync job queue with bounded concurrency
//! - [`OutboxPoller`] submits outbox logs exactly once
//! - [`PaymentWatcher`] turns payments into renewals and applies relayed
//!   system commands
//! - [`TtlReclaimer`] and [`Compactor`] maintain the store
//!
//! [`Service`] starts all of them under one cancellation token, and
//! [`Backend`] is the read/write surface for the request layer.

#![deny(unsafe_code)]

mod api;
mod driver;
mod error;
mod identity;
mod jobs;
mod maintenance;
mod outbox;
mod payments;
mod service;
mod sync;
pub mod telemetry;

pub use api::Backend;
pub use error::{Result, WorkerError};
pub use identity::IdentityCache;
pub use jobs::{JobCycle, JobRunner};
pub use maintenance::{Compactor, TtlReclaimer};
pub use outbox::{Delivery, OutboxCycle, OutboxPoller};
pub use payments::{PaymentWatcher, apply_command, renewal_trace_id};
pub use service::{Service, shutdown_signal};
pub use sync::{SyncEngine, SyncOutcome};
