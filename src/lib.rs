//! # keyed-async-cache
//!
//! A keyed asynchronous memoization cache. Given a key and an async producer it
//! deduplicates concurrent requests for the key, memoizes the resolved value or the
//! error, and answers every read synchronously with a [`Snapshot`](snapshot::Snapshot)
//! of the entry's current state.
//!
//! ```rust,no_run
//! use keyed_async_cache::prelude::*;
//!
//! # async fn demo() -> Result<(), CacheError> {
//! let cache = create_cache(|next: AsyncCache| {
//!     // hand `next` to whatever re-runs the reads
//!     let _ = next;
//! });
//!
//! match cache.read_with_param("user", |id: u32| async move { Ok::<_, String>(id * 2) }, 21)? {
//!     Snapshot::Pending => println!("loading"),
//!     Snapshot::Resolved(value) => println!("value: {value}"),
//!     Snapshot::Rejected(error) => println!("error: {error}"),
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod cache;
pub mod errors;
pub mod global;
pub mod key;
mod log_utils;
pub mod provider;
pub mod runtime;
pub mod snapshot;
pub mod types;

// Re-export commonly used items at crate root for convenience
pub use cache::{AsyncCache, create_cache};
pub use global::init;
pub use runtime::CacheConfig;

pub mod prelude {
    //! The prelude exports all the most common types and functions for using keyed-async-cache.

    // The cache handle and its factory
    pub use crate::cache::{AsyncCache, CacheStats, create_cache};

    // The snapshot enum, needed for matching
    pub use crate::snapshot::{AsyncState, Snapshot};

    // Construction and scoping
    pub use crate::provider::CacheProvider;
    pub use crate::runtime::{CacheConfig, Spawner};

    // Global default instance
    pub use crate::global::{default_cache, get_global_cache, init};

    // Error types
    pub use crate::errors::{CacheError, CacheResult, GlobalCacheError};
}
