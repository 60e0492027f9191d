//! Credential to identity cache with request coalescing.
//!
//! The request layer resolves a bearer credential to a user identity on
//! every call. [`IdentityCache`] keeps resolved identities for a TTL and
//! makes concurrent lookups of the same credential share one resolver call:
//! the first caller resolves while holding the credential's in-flight lock,
//! later callers wait on that lock and then read the cached value.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Default number of cached identities.
const DEFAULT_CAPACITY: usize = 10_000;

/// Default identity lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Cached<V> {
    value: V,
    stored_at: Instant,
}

/// A bounded, TTL-limited cache of resolved identities.
#[derive(Debug, bon::Builder)]
pub struct IdentityCache<V: Clone> {
    #[builder(skip)]
    entries: DashMap<String, Cached<V>>,
    #[builder(skip)]
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    /// Maximum cached identities.
    #[builder(default = DEFAULT_CAPACITY)]
    capacity: usize,
    /// Lifetime of a cached identity.
    #[builder(default = DEFAULT_TTL)]
    ttl: Duration,
}

impl<V: Clone> IdentityCache<V> {
    /// Returns the cached identity for `credential`, if still fresh.
    pub fn get(&self, credential: &str) -> Option<V> {
        let fresh = self
            .entries
            .get(credential)
            .filter(|cached| cached.stored_at.elapsed() < self.ttl)
            .map(|cached| cached.value.clone());
        if fresh.is_none() {
            self.entries.remove_if(credential, |_, cached| cached.stored_at.elapsed() >= self.ttl);
        }
        fresh
    }

    /// Returns the identity for `credential`, calling `resolve` on a miss.
    ///
    /// Concurrent calls for the same credential run `resolve` once. A failed
    /// resolution is not cached; the next waiter resolves again.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error.
    pub async fn get_or_resolve<F, Fut, E>(&self, credential: &str, resolve: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(credential) {
            return Ok(value);
        }

        let lock = Arc::clone(&*self.in_flight.entry(credential.to_string()).or_default());
        let resolved = {
            let _guard = lock.lock().await;
            match self.get(credential) {
                Some(value) => Ok(value),
                None => {
                    debug!("Resolving identity");
                    let resolved = resolve().await;
                    if let Ok(value) = &resolved {
                        self.insert(credential, value.clone());
                    }
                    resolved
                },
            }
        };

        // The last holder retires the lock: the map and this call are the
        // only references left. Later callers then start a fresh lock.
        self.in_flight.remove_if(credential, |_, current| {
            Arc::ptr_eq(current, &lock) && Arc::strong_count(current) == 2
        });
        resolved
    }

    /// Stores an identity, evicting to stay within capacity.
    pub fn insert(&self, credential: &str, value: V) {
        if !self.entries.contains_key(credential) && self.entries.len() >= self.capacity {
            self.evict();
        }
        self.entries.insert(credential.to_string(), Cached { value, stored_at: Instant::now() });
    }

    /// Drops a credential, e.g. after it was revoked.
    pub fn invalidate(&self, credential: &str) {
        self.entries.remove(credential);
    }

    /// Number of cached identities, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&self) {
        self.entries.retain(|_, cached| cached.stored_at.elapsed() < self.ttl);
        while self.entries.len() >= self.capacity.max(1) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                },
                None => break,
            }
        }
    }
}

impl<V: Clone> Default for IdentityCache<V> {
    fn default() -> Self {
        Self::builder().build()
    }
}
