//! Scoped cache provider
//!
//! A [`CacheProvider`] owns one cache instance for a scope (a session, a window, a
//! request tree) and publishes the latest handle through a `tokio::sync::watch`
//! channel. A binding layer subscribes, and re-issues its reads whenever the
//! receiver reports a change.
//!
//! ```rust,no_run
//! use keyed_async_cache::{provider::CacheProvider, snapshot::Snapshot};
//!
//! # async fn demo() {
//! let provider = CacheProvider::new();
//! let mut changes = provider.subscribe();
//!
//! let user: Snapshot<String, String> =
//!     provider.cache().read("user:1", || async { Ok("Ada".to_string()) });
//! assert!(user.is_pending());
//!
//! changes.changed().await.unwrap();
//! let user: Snapshot<String, String> =
//!     changes.borrow().read("user:1", || async { Ok("Ada".to_string()) });
//! assert_eq!(user, Snapshot::Resolved("Ada".to_string()));
//! # }
//! ```

use std::sync::{Arc, Weak};

use tokio::sync::watch;

use crate::{cache::AsyncCache, runtime::CacheConfig};

/// Owner of a scoped cache instance and of its latest handle
#[derive(Clone)]
pub struct CacheProvider {
    sender: Arc<watch::Sender<AsyncCache>>,
}

impl CacheProvider {
    /// Creates a provider with a fresh cache and default settings.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::new())
    }

    /// Creates a provider with a fresh cache built from `config`.
    pub fn with_config(config: CacheConfig) -> Self {
        // The cache only holds a weak reference back to the channel; the channel
        // holds the latest handle, so a strong one would never be freed.
        let sender = Arc::new_cyclic(|channel: &Weak<watch::Sender<AsyncCache>>| {
            let channel = channel.clone();
            let cache = config.build(move |next| {
                if let Some(sender) = channel.upgrade() {
                    publish(&sender, next);
                }
            });
            watch::channel(cache).0
        });
        Self { sender }
    }

    /// The latest handle of this scope's cache.
    pub fn cache(&self) -> AsyncCache {
        self.sender.borrow().clone()
    }

    /// Subscribes to handle changes; the receiver starts at the latest handle.
    ///
    /// Clone the handle out of `borrow()` before calling `reset` or `clear` on it:
    /// publishing waits for outstanding borrows.
    pub fn subscribe(&self) -> watch::Receiver<AsyncCache> {
        self.sender.subscribe()
    }
}

/// Replaces the published handle unless it already carries a newer revision.
///
/// Settlements on different threads can deliver their handles out of order.
fn publish(sender: &watch::Sender<AsyncCache>, next: AsyncCache) {
    sender.send_if_modified(|current| {
        if next.revision() > current.revision() {
            *current = next;
            true
        } else {
            false
        }
    });
}

impl Default for CacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("cache", &*self.sender.borrow())
            .finish()
    }
}
