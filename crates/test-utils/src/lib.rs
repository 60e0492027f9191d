//! Shared test utilities for the cowallet crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`TestDir`] - Managed temporary directory with path helpers
//! - [`assert_eventually`] - Poll a condition until it's true or timeout
//! - [`fixtures`] - Deterministic users, assets, addresses, and timestamps
//! - [`strategies`] - Proptest generators for domain values

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::{assert_eventually, poll_until};

pub mod fixtures;
pub mod strategies;
