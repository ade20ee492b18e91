//! Snapshot: the non-blocking view of one cache entry
//!
//! This module provides the `Snapshot` enum returned by every cache read and the
//! `AsyncState` trait for working with loading/success/error style states.

use serde::{Deserialize, Serialize};

/// Common trait for async state types that represent loading, success, and error states
///
/// This trait provides a unified interface for code that only cares whether a value
/// is still being produced, has been produced, or failed.
pub trait AsyncState {
    /// The type of successful data
    type Data;
    /// The type of error
    type Error;

    /// Returns true if the value is still being produced (or was never requested)
    fn is_pending(&self) -> bool;

    /// Returns true if the state contains successful data
    fn is_resolved(&self) -> bool;

    /// Returns true if the state contains an error
    fn is_rejected(&self) -> bool;

    /// Returns the data if resolved, None otherwise
    fn data(&self) -> Option<&Self::Data>;

    /// Returns the error if rejected, None otherwise
    fn error(&self) -> Option<&Self::Error>;
}

/// Represents the currently known state of a cache entry
///
/// Serializes to the `{state, payload?}` shape:
///
/// ```rust
/// use keyed_async_cache::snapshot::Snapshot;
///
/// let pending: Snapshot<u32, String> = Snapshot::Pending;
/// assert_eq!(serde_json::to_string(&pending).unwrap(), r#"{"state":"pending"}"#);
///
/// let resolved: Snapshot<u32, String> = Snapshot::Resolved(100);
/// assert_eq!(
///     serde_json::to_string(&resolved).unwrap(),
///     r#"{"state":"resolved","payload":100}"#
/// );
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "state", content = "payload", rename_all = "lowercase")]
pub enum Snapshot<T, E> {
    /// No settled value yet; a producer is running or was never started
    Pending,
    /// The producer completed successfully with data
    Resolved(T),
    /// The producer failed with an error
    Rejected(E),
}

impl<T, E> Default for Snapshot<T, E> {
    fn default() -> Self {
        Snapshot::Pending
    }
}

impl<T, E> AsyncState for Snapshot<T, E> {
    type Data = T;
    type Error = E;

    fn is_pending(&self) -> bool {
        matches!(self, Snapshot::Pending)
    }

    fn is_resolved(&self) -> bool {
        matches!(self, Snapshot::Resolved(_))
    }

    fn is_rejected(&self) -> bool {
        matches!(self, Snapshot::Rejected(_))
    }

    fn data(&self) -> Option<&T> {
        match self {
            Snapshot::Resolved(data) => Some(data),
            _ => None,
        }
    }

    fn error(&self) -> Option<&E> {
        match self {
            Snapshot::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl<T, E> Snapshot<T, E> {
    /// Returns true if the value is still being produced (or was never requested)
    pub fn is_pending(&self) -> bool {
        <Self as AsyncState>::is_pending(self)
    }

    /// Returns true if the state contains successful data
    pub fn is_resolved(&self) -> bool {
        <Self as AsyncState>::is_resolved(self)
    }

    /// Returns true if the state contains an error
    pub fn is_rejected(&self) -> bool {
        <Self as AsyncState>::is_rejected(self)
    }

    /// Returns the data if resolved, None otherwise
    pub fn data(&self) -> Option<&T> {
        <Self as AsyncState>::data(self)
    }

    /// Returns the error if rejected, None otherwise
    pub fn error(&self) -> Option<&E> {
        <Self as AsyncState>::error(self)
    }

    /// Converts a settled snapshot into a `Result`, or `None` while pending.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            Snapshot::Pending => None,
            Snapshot::Resolved(data) => Some(Ok(data)),
            Snapshot::Rejected(error) => Some(Err(error)),
        }
    }

    /// Maps a Snapshot<T, E> to Snapshot<U, E> by applying a function to the contained data if resolved.
    pub fn map<U, F>(self, op: F) -> Snapshot<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Snapshot::Resolved(data) => Snapshot::Resolved(op(data)),
            Snapshot::Rejected(e) => Snapshot::Rejected(e),
            Snapshot::Pending => Snapshot::Pending,
        }
    }

    /// Maps a Snapshot<T, E> to Snapshot<T, F> by applying a function to the contained error if rejected.
    pub fn map_err<F, O>(self, op: O) -> Snapshot<T, F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Snapshot::Resolved(data) => Snapshot::Resolved(data),
            Snapshot::Rejected(e) => Snapshot::Rejected(op(e)),
            Snapshot::Pending => Snapshot::Pending,
        }
    }

    /// Chains a Snapshot<T, E> to Snapshot<U, E> by applying a function to the contained data if resolved.
    pub fn and_then<U, F>(self, op: F) -> Snapshot<U, E>
    where
        F: FnOnce(T) -> Snapshot<U, E>,
    {
        match self {
            Snapshot::Resolved(data) => op(data),
            Snapshot::Rejected(e) => Snapshot::Rejected(e),
            Snapshot::Pending => Snapshot::Pending,
        }
    }
}

impl<T, E> From<Result<T, E>> for Snapshot<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Snapshot::Resolved(data),
            Err(error) => Snapshot::Rejected(error),
        }
    }
}
