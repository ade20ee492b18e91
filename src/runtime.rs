//! Runtime pieces that back the cache: task spawning and construction.
//!
//! Producers run as detached tasks. Where they run is decided by a [`Spawner`],
//! which defaults to the ambient Tokio runtime.

pub mod request;

use std::{fmt, sync::Arc};

use futures::future::BoxFuture;

use crate::cache::AsyncCache;

type SpawnFn = dyn Fn(BoxFuture<'static, ()>) + Send + Sync;

/// Handle that runs producer futures to completion in the background.
#[derive(Clone)]
pub struct Spawner {
    spawn: Arc<SpawnFn>,
}

impl Spawner {
    /// Wraps a custom spawn function.
    pub fn new<F>(spawn: F) -> Self
    where
        F: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
    {
        Self {
            spawn: Arc::new(spawn),
        }
    }

    /// Spawns onto the Tokio runtime current at spawn time.
    ///
    /// ## Panics
    ///
    /// Spawning panics when called outside a Tokio runtime, as `tokio::spawn` does.
    pub fn tokio() -> Self {
        Self::new(|task| {
            tokio::spawn(task);
        })
    }

    /// Spawns onto a specific Tokio runtime, usable from any thread.
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self::new(move |task| {
            handle.spawn(task);
        })
    }

    pub(crate) fn spawn(&self, task: BoxFuture<'static, ()>) {
        (self.spawn)(task)
    }
}

impl Default for Spawner {
    fn default() -> Self {
        Self::tokio()
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner").finish_non_exhaustive()
    }
}

/// Configuration for building cache instances.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    spawner: Spawner,
}

impl CacheConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run producers through a custom spawner.
    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }

    /// Run producers on the given Tokio runtime.
    pub fn with_runtime_handle(self, handle: tokio::runtime::Handle) -> Self {
        self.with_spawner(Spawner::with_handle(handle))
    }

    /// Build a cache instance that reports every state change to `on_change`.
    pub fn build<F>(self, on_change: F) -> AsyncCache
    where
        F: Fn(AsyncCache) + Send + Sync + 'static,
    {
        AsyncCache::from_parts(self, Box::new(on_change))
    }

    pub(crate) fn into_spawner(self) -> Spawner {
        self.spawner
    }
}
