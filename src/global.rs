//! # Global Default Cache
//!
//! Code that runs outside any explicit scope reads through one process-wide cache.
//! Its notifications are discarded: state still changes, nobody is told. Scoped
//! code should construct its own [`AsyncCache`] or [`CacheProvider`](crate::provider::CacheProvider)
//! and pass it down explicitly.

use std::sync::OnceLock;

use crate::{cache::AsyncCache, errors::GlobalCacheError, runtime::CacheConfig};

/// Global singleton instance of the default cache
static GLOBAL_CACHE: OnceLock<AsyncCache> = OnceLock::new();

impl CacheConfig {
    /// Install a cache built from this configuration as the global default.
    ///
    /// The global cache always uses a no-op notifier.
    ///
    /// ## Errors
    ///
    /// Returns `GlobalCacheError::AlreadyInitialized` if a global cache exists already.
    pub fn init_global(self) -> Result<(), GlobalCacheError> {
        let cache = self.build(|_| {});
        GLOBAL_CACHE
            .set(cache)
            .map_err(|_| GlobalCacheError::AlreadyInitialized)?;
        crate::debug_log!("🌐 [GLOBAL-CACHE] Installed configured global cache");
        Ok(())
    }
}

/// Initialize the global default cache with default settings
///
/// Calling this more than once is harmless; the first instance is kept, including
/// one installed by [`CacheConfig::init_global`]. Use that method instead when a
/// second installation should be reported as an error.
///
/// ## Example
///
/// ```rust,no_run
/// use keyed_async_cache::global;
///
/// #[tokio::main]
/// async fn main() {
///     global::init();
///     let cache = global::get_global_cache().unwrap();
///     cache.reset("user:1");
/// }
/// ```
pub fn init() {
    GLOBAL_CACHE.get_or_init(AsyncCache::detached);
}

/// Get the global default cache instance
///
/// ## Errors
///
/// Returns `GlobalCacheError::NotInitialized` if neither `init()` nor
/// `CacheConfig::init_global()` has been called yet.
pub fn get_global_cache() -> Result<&'static AsyncCache, GlobalCacheError> {
    GLOBAL_CACHE.get().ok_or(GlobalCacheError::NotInitialized)
}

/// Check if the global cache has been initialized
pub fn is_initialized() -> bool {
    GLOBAL_CACHE.get().is_some()
}

/// Get the global default cache, initializing it with default settings if needed
pub fn default_cache() -> &'static AsyncCache {
    GLOBAL_CACHE.get_or_init(AsyncCache::detached)
}
