//! # Keyed Async Cache
//!
//! This module implements the keyed asynchronous memoization cache:
//! - **Memoization**: resolved values and producer errors are kept until explicitly reset.
//! - **Deduplication**: at most one producer runs per key at a time.
//! - **Non-blocking reads**: every read returns a [`Snapshot`] immediately.
//! - **Change notification**: every settlement or reset hands a fresh [`AsyncCache`]
//!   handle to the notification callback, so observers can compare handles to
//!   detect change.
//!
//! ## Example
//! ```rust,no_run
//! use keyed_async_cache::{cache::create_cache, snapshot::Snapshot};
//!
//! # async fn demo() {
//! let cache = create_cache(|_next| {});
//! let first: Snapshot<u32, String> = cache.read("answer", || async { Ok(42) });
//! assert!(first.is_pending());
//! # }
//! ```

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    errors::CacheResult,
    key::param_key,
    runtime::{CacheConfig, Spawner, request::start_request},
    snapshot::Snapshot,
    types::{CacheErrorBounds, CacheParamBounds, CacheValueBounds, Payload},
};

/// Callback invoked with a fresh handle after every state transition
///
/// Revisions are assigned in commit order, but callbacks for changes committed on
/// different threads may run concurrently and arrive out of order. Observers that keep
/// the latest handle should compare [`AsyncCache::revision`].
pub type OnChange = Box<dyn Fn(AsyncCache) + Send + Sync>;

/// Outcome of a producer run, as committed into the store
pub(crate) enum Settlement {
    Resolved(Payload),
    Rejected(Payload),
    Panicked,
}

/// What a read finds for a key, before deciding whether to start a producer
enum Lookup<D, E> {
    Settled(Snapshot<D, E>),
    InFlight,
    Mismatch,
    Miss,
}

/// The three per-key mappings
#[derive(Default)]
pub(crate) struct Entries {
    resolved: HashMap<String, Payload>,
    rejected: HashMap<String, Payload>,
    /// Key to the ticket of the producer run currently allowed to settle it
    in_flight: HashMap<String, u64>,
}

impl Entries {
    fn lookup<D, E>(&self, key: &str) -> Lookup<D, E>
    where
        D: CacheValueBounds,
        E: CacheErrorBounds,
    {
        if let Some(payload) = self.resolved.get(key) {
            return match payload.downcast_ref::<D>() {
                Some(value) => Lookup::Settled(Snapshot::Resolved(value.clone())),
                None => Lookup::Mismatch,
            };
        }
        if let Some(payload) = self.rejected.get(key) {
            return match payload.downcast_ref::<E>() {
                Some(error) => Lookup::Settled(Snapshot::Rejected(error.clone())),
                None => Lookup::Mismatch,
            };
        }
        if self.in_flight.contains_key(key) {
            return Lookup::InFlight;
        }
        Lookup::Miss
    }

    fn remove(&mut self, key: &str) {
        self.resolved.remove(key);
        self.rejected.remove(key);
        self.in_flight.remove(key);
    }

    fn clear(&mut self) {
        self.resolved.clear();
        self.rejected.clear();
        self.in_flight.clear();
    }
}

/// Shared mutable state behind every handle of one cache instance
pub(crate) struct Store {
    entries: Mutex<Entries>,
    next_ticket: AtomicU64,
    revision: AtomicU64,
    on_change: OnChange,
    spawner: Spawner,
}

impl Store {
    fn entries(&self) -> MutexGuard<'_, Entries> {
        // Nothing user-supplied runs under this lock, so a poisoned guard still
        // holds consistent maps.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    /// Commits a producer outcome if `ticket` still owns the key.
    pub(crate) fn settle(self: &Arc<Self>, key: &str, ticket: u64, settlement: Settlement) {
        let revision = {
            let mut entries = self.entries();
            if entries.in_flight.get(key) != Some(&ticket) {
                crate::log_stale_discard!(
                    "Dropping result for key: {} (ticket {} no longer current)",
                    key,
                    ticket
                );
                return;
            }
            entries.in_flight.remove(key);
            match settlement {
                Settlement::Resolved(payload) => {
                    entries.resolved.insert(key.to_string(), payload);
                    crate::log_cache_store!("Resolved key: {}", key);
                }
                Settlement::Rejected(payload) => {
                    entries.rejected.insert(key.to_string(), payload);
                    crate::log_cache_store!("Rejected key: {}", key);
                }
                Settlement::Panicked => {
                    crate::warn_log!(
                        "Producer for key {} panicked; the key can be requested again",
                        key
                    );
                }
            }
            self.next_revision()
        };
        self.notify(revision);
    }

    /// Releases the in-flight marker of a run that will never settle.
    ///
    /// Observers are only told when `announce` is set; a run dropped while `read`
    /// is still on the stack is reported to its caller as pending instead.
    pub(crate) fn release(self: &Arc<Self>, key: &str, ticket: u64, announce: bool) {
        let revision = {
            let mut entries = self.entries();
            if entries.in_flight.get(key) != Some(&ticket) {
                return;
            }
            entries.in_flight.remove(key);
            crate::warn_log!(
                "Producer for key {} was dropped before settling; the key can be requested again",
                key
            );
            if !announce {
                return;
            }
            self.next_revision()
        };
        self.notify(revision);
    }

    /// Must be called with the entries lock held, so revisions follow the order
    /// in which state changes were committed.
    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn notify(self: &Arc<Self>, revision: u64) {
        (self.on_change)(AsyncCache {
            store: Arc::clone(self),
            revision,
        });
    }
}

/// Handle to a keyed async cache
///
/// Handles are cheap to clone and all handles of one instance share the same maps.
/// Each notification carries a handle with a new revision; two handles compare equal
/// only when they belong to the same instance and carry the same revision.
#[derive(Clone)]
pub struct AsyncCache {
    store: Arc<Store>,
    revision: u64,
}

impl AsyncCache {
    /// Creates a cache that reports every state change to `on_change`.
    pub fn new<F>(on_change: F) -> Self
    where
        F: Fn(AsyncCache) + Send + Sync + 'static,
    {
        CacheConfig::new().build(on_change)
    }

    /// Creates a cache whose notifications are discarded.
    pub fn detached() -> Self {
        Self::new(|_| {})
    }

    pub(crate) fn from_parts(config: CacheConfig, on_change: OnChange) -> Self {
        Self {
            store: Arc::new(Store {
                entries: Mutex::new(Entries::default()),
                next_ticket: AtomicU64::new(0),
                revision: AtomicU64::new(0),
                on_change,
                spawner: config.into_spawner(),
            }),
            revision: 0,
        }
    }

    /// Revision this handle was created at. Zero for the handle returned at construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if both handles belong to the same cache instance.
    pub fn same_instance(&self, other: &AsyncCache) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Reads `key`, starting `producer` if the key has never been requested.
    ///
    /// - Resolved or rejected keys return their memoized payload with no side effect.
    /// - A key with a running producer returns [`Snapshot::Pending`] and does not call
    ///   `producer`.
    /// - Otherwise the key is marked in flight, `producer` is called and its future is
    ///   spawned, and [`Snapshot::Pending`] is returned.
    ///
    /// The payload type must match the type the key was settled with; a mismatch is
    /// logged and reported as pending.
    pub fn read<D, E, F, Fut>(&self, key: &str, producer: F) -> Snapshot<D, E>
    where
        D: CacheValueBounds,
        E: CacheErrorBounds,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
    {
        let ticket = {
            let mut entries = self.store.entries();
            match entries.lookup::<D, E>(key) {
                Lookup::Settled(snapshot) => {
                    crate::log_cache_hit!("Settled entry for key: {}", key);
                    return snapshot;
                }
                Lookup::InFlight => {
                    crate::log_request_dedup!("Request already pending for key: {}", key);
                    return Snapshot::Pending;
                }
                Lookup::Mismatch => {
                    crate::warn_log!(
                        "Key {} holds a payload of another type than {} / {}",
                        key,
                        std::any::type_name::<D>(),
                        std::any::type_name::<E>()
                    );
                    return Snapshot::Pending;
                }
                Lookup::Miss => {
                    let ticket = self.store.next_ticket.fetch_add(1, Ordering::SeqCst);
                    entries.in_flight.insert(key.to_string(), ticket);
                    ticket
                }
            }
        };

        crate::log_request_start!("Starting new request for key: {}", key);
        start_request(&self.store, key, ticket, producer);
        Snapshot::Pending
    }

    /// Reads the entry keyed by `prefix` followed by the canonical encoding of `arg`.
    ///
    /// Behaves like [`read`](Self::read); when a producer must start it is called as
    /// `producer(arg)`. Arguments with equal encodings share one entry.
    ///
    /// ## Errors
    ///
    /// Returns [`CacheError::KeySerialization`](crate::errors::CacheError::KeySerialization)
    /// if `arg` cannot be encoded. No state changes in that case.
    pub fn read_with_param<A, D, E, F, Fut>(
        &self,
        prefix: &str,
        producer: F,
        arg: A,
    ) -> CacheResult<Snapshot<D, E>>
    where
        A: CacheParamBounds,
        D: CacheValueBounds,
        E: CacheErrorBounds,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
    {
        let key = param_key(prefix, &arg)?;
        Ok(self.read(&key, move || producer(arg)))
    }

    /// Returns the current state of `key` without ever starting a producer.
    pub fn peek<D, E>(&self, key: &str) -> Snapshot<D, E>
    where
        D: CacheValueBounds,
        E: CacheErrorBounds,
    {
        match self.store.entries().lookup::<D, E>(key) {
            Lookup::Settled(snapshot) => snapshot,
            _ => Snapshot::Pending,
        }
    }

    /// Returns true while a producer for `key` is running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.store.entries().in_flight.contains_key(key)
    }

    /// Forgets everything about `key` and notifies observers.
    ///
    /// A producer still running for the key is not cancelled; its result is discarded
    /// when it settles, so it can never overwrite a newer run.
    pub fn reset(&self, key: &str) {
        let revision = {
            let mut entries = self.store.entries();
            entries.remove(key);
            crate::log_cache_invalidate!("Reset key: {}", key);
            self.store.next_revision()
        };
        self.store.notify(revision);
    }

    /// Resets the entry keyed by `prefix` followed by the canonical encoding of `arg`.
    pub fn reset_with_param<A>(&self, prefix: &str, arg: &A) -> CacheResult<()>
    where
        A: CacheParamBounds,
    {
        let key = param_key(prefix, arg)?;
        self.reset(&key);
        Ok(())
    }

    /// Resets every key at once, with a single notification.
    pub fn clear(&self) {
        let revision = {
            let mut entries = self.store.entries();
            #[cfg(feature = "tracing")]
            let count = entries.resolved.len() + entries.rejected.len() + entries.in_flight.len();
            entries.clear();
            #[cfg(feature = "tracing")]
            crate::log_cache_invalidate!("Cleared {} cache entries", count);
            self.store.next_revision()
        };
        self.store.notify(revision);
    }

    /// Gets cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.store.entries();
        CacheStats {
            resolved: entries.resolved.len(),
            rejected: entries.rejected.len(),
            in_flight: entries.in_flight.len(),
            revision: self.store.revision.load(Ordering::SeqCst),
        }
    }
}

impl PartialEq for AsyncCache {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other) && self.revision == other.revision
    }
}

impl Eq for AsyncCache {}

impl fmt::Debug for AsyncCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCache")
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// Creates a cache that reports every state change to `on_change`.
///
/// Shorthand for [`AsyncCache::new`].
pub fn create_cache<F>(on_change: F) -> AsyncCache
where
    F: Fn(AsyncCache) + Send + Sync + 'static,
{
    AsyncCache::new(on_change)
}

/// General cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub resolved: usize,
    pub rejected: usize,
    pub in_flight: usize,
    /// Number of notifications emitted so far
    pub revision: u64,
}

impl CacheStats {
    /// Number of keys holding a settled payload
    pub fn settled(&self) -> usize {
        self.resolved + self.rejected
    }
}
