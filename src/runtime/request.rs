//! Producer orchestration for cache misses.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::FutureExt;

use crate::{
    cache::{Settlement, Store},
    types::{CacheErrorBounds, CacheValueBounds, Payload},
};

/// Owns the in-flight marker of one producer run until the run settles.
///
/// Dropping an armed guard releases the marker. That covers a producer closure that
/// unwinds, a spawner that panics or discards the task, and a task dropped before it
/// finished (for example when its runtime shuts down).
struct InFlightGuard {
    store: Arc<Store>,
    key: String,
    ticket: u64,
    /// Set once the spawner accepted the task; only later drops are announced.
    spawned: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            let announce = self.spawned.load(Ordering::SeqCst);
            self.store.release(&self.key, self.ticket, announce);
        }
    }
}

/// Calls `producer` and spawns its future; the outcome is committed under `ticket`.
///
/// The caller must already have marked `key` in flight with `ticket`.
pub(crate) fn start_request<D, E, F, Fut>(store: &Arc<Store>, key: &str, ticket: u64, producer: F)
where
    D: CacheValueBounds,
    E: CacheErrorBounds,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<D, E>> + Send + 'static,
{
    let spawned = Arc::new(AtomicBool::new(false));
    let mut guard = InFlightGuard {
        store: Arc::clone(store),
        key: key.to_string(),
        ticket,
        spawned: Arc::clone(&spawned),
        armed: true,
    };
    let future = producer();

    let task = async move {
        let settlement = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => Settlement::Resolved(Arc::new(value) as Payload),
            Ok(Err(error)) => Settlement::Rejected(Arc::new(error) as Payload),
            Err(_) => Settlement::Panicked,
        };
        guard.armed = false;
        guard.store.settle(&guard.key, guard.ticket, settlement);
    };
    store.spawner().spawn(task.boxed());
    spawned.store(true, Ordering::SeqCst);
}
