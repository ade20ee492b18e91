//! Error types for keyed-async-cache
//!
//! Producer failures are not represented here: they are user data and come back
//! verbatim as [`Snapshot::Rejected`](crate::snapshot::Snapshot::Rejected).

/// Errors raised at the call site of cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The argument of a parameterized read or reset could not be turned into a key
    #[error("failed to derive cache key from argument: {0}")]
    KeySerialization(#[from] serde_json::Error),
}

/// Error type for global cache operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlobalCacheError {
    #[error("Global cache not initialized. Call init() first.")]
    NotInitialized,
    #[error("Global cache already initialized")]
    AlreadyInitialized,
}

/// Convenience alias for results of cache operations
pub type CacheResult<T> = Result<T, CacheError>;
