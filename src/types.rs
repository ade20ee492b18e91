//! Common types and aliases used throughout keyed-async-cache

use std::{any::Any, sync::Arc};

/// Common trait bounds for memoized values
pub trait CacheValueBounds: Clone + Send + Sync + 'static {}
impl<T> CacheValueBounds for T where T: Clone + Send + Sync + 'static {}

/// Common trait bounds for memoized producer errors
pub trait CacheErrorBounds: Clone + Send + Sync + 'static {}
impl<T> CacheErrorBounds for T where T: Clone + Send + Sync + 'static {}

/// Common trait bounds for arguments of parameterized reads
pub trait CacheParamBounds: serde::Serialize {}
impl<T> CacheParamBounds for T where T: serde::Serialize + ?Sized {}

/// Type-erased payload stored in the resolved and error maps
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;
