//! Request coalescing cache.
//!
//! Data-fetching callers wrap their backend calls in
//! [`RequestCache::get_or_set`] so that:
//!
//! - a successful result is reused for the TTL without calling the backend again
//! - concurrent calls for the same key share one outstanding fetch
//! - a failed fetch leaves nothing behind, so the next call starts clean
//!
//! ## Registration Before Suspension
//!
//! The in-flight fetch is inserted into the map under the lock, before the
//! caller first awaits. Any call for the same key that arrives afterwards finds
//! it and joins it. The lock is never held across an await, so the cache is
//! usable from a multi-threaded runtime as well as a single-threaded one.
//!
//! ## Errors
//!
//! Producer errors are returned unchanged to every caller that joined the
//! fetch. The cache does not retry, wrap or remember them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

/// Validity window for coalesced data fetches.
pub const REQUEST_CACHE_TTL: Duration = Duration::from_secs(30);

/// Validity window for per-user profile and session lookups.
pub const PROFILE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub fn dashboard_key(patient_id: &str) -> String {
    format!("dashboard-{patient_id}")
}

pub fn profile_key(user_id: &str) -> String {
    format!("profile_{user_id}")
}

type InFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct CacheEntry<T, E> {
    /// None while the first fetch for this key is outstanding.
    data: Option<T>,
    timestamp: Instant,
    in_flight: Option<InFlight<T, E>>,
}

impl<T, E> CacheEntry<T, E> {
    fn fresh_data(&self, ttl: Duration) -> Option<&T> {
        if self.timestamp.elapsed() < ttl {
            self.data.as_ref()
        } else {
            None
        }
    }
}

enum Lookup<T, E> {
    Hit(T),
    Join(InFlight<T, E>),
    Miss,
}

/// Keyed cache that coalesces concurrent fetches. One instance per data kind.
pub struct RequestCache<T, E> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T, E>>>,
}

impl<T, E> Default for RequestCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(REQUEST_CACHE_TTL)
    }
}

impl<T, E> RequestCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T, E>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns fresh cached data for `key`, joins an outstanding fetch, or
    /// calls `producer` once and caches its successful result.
    pub async fn get_or_set<F, Fut>(&self, key: &str, producer: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let in_flight = {
            let mut entries = self.entries();
            let lookup = match entries.get(key) {
                Some(CacheEntry {
                    in_flight: Some(in_flight),
                    ..
                }) => Lookup::Join(in_flight.clone()),
                Some(entry) => match entry.fresh_data(self.ttl) {
                    Some(data) => Lookup::Hit(data.clone()),
                    None => Lookup::Miss,
                },
                None => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(data) => {
                    debug!(key, "Cache hit");
                    return Ok(data);
                }
                Lookup::Join(in_flight) => {
                    debug!(key, "Joining in-flight request");
                    in_flight
                }
                Lookup::Miss => {
                    debug!(key, "Cache miss, fetching");
                    let in_flight: InFlight<T, E> = producer().boxed().shared();
                    entries.insert(
                        key.to_string(),
                        CacheEntry {
                            data: None,
                            timestamp: Instant::now(),
                            in_flight: Some(in_flight.clone()),
                        },
                    );
                    in_flight
                }
            }
        };

        let result = in_flight.clone().await;
        self.settle(key, &in_flight, &result);
        result
    }

    /// Records the outcome of `in_flight` if it is still the fetch registered
    /// for `key`. Every joined caller calls this; only the first one writes.
    fn settle(&self, key: &str, in_flight: &InFlight<T, E>, result: &Result<T, E>) {
        let mut entries = self.entries();
        let registered = entries
            .get(key)
            .and_then(|entry| entry.in_flight.as_ref())
            .is_some_and(|current| current.ptr_eq(in_flight));
        if !registered {
            return;
        }

        match result {
            Ok(data) => {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        data: Some(data.clone()),
                        timestamp: Instant::now(),
                        in_flight: None,
                    },
                );
            }
            Err(_) => {
                debug!(key, "Fetch failed, dropping cache entry");
                entries.remove(key);
            }
        }
    }

    /// Fresh data for `key`, without joining or starting a fetch.
    pub fn get_cached(&self, key: &str) -> Option<T> {
        self.entries()
            .get(key)
            .and_then(|entry| entry.fresh_data(self.ttl))
            .cloned()
    }

    /// Stores `value` with a fresh timestamp. An outstanding fetch for `key`
    /// still completes for its callers but no longer overwrites this value.
    pub fn set_cached(&self, key: &str, value: T) {
        self.entries().insert(
            key.to_string(),
            CacheEntry {
                data: Some(value),
                timestamp: Instant::now(),
                in_flight: None,
            },
        );
    }

    /// Removes one key, or every entry when `key` is `None`.
    pub fn clear(&self, key: Option<&str>) {
        let mut entries = self.entries();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries()
            .values()
            .filter(|entry| entry.in_flight.is_some())
            .count()
    }
}
