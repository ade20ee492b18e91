//! Key derivation for parameterized reads
//!
//! A parameterized key is `prefix + stable_serialize(arg)`. The encoding is
//! canonical JSON:
//!
//! - the argument is serialized with `serde_json`,
//! - every object, at any depth, has its keys emitted in ascending byte order,
//! - output is compact (no whitespace).
//!
//! Numbers and strings are emitted exactly as `serde_json` writes them, so `1u32`
//! encodes as `1` while `1.0f64` encodes as `1.0`. Two arguments that encode to the
//! same string share one cache entry; that aliasing is part of the contract.
//!
//! ```rust
//! use std::collections::HashMap;
//! use keyed_async_cache::key::{param_key, stable_serialize};
//!
//! let mut a = HashMap::new();
//! a.insert("zeta", 1);
//! a.insert("alpha", 2);
//!
//! assert_eq!(stable_serialize(&a).unwrap(), r#"{"alpha":2,"zeta":1}"#);
//! assert_eq!(param_key("user", &42).unwrap(), "user42");
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::CacheResult;

/// Serializes `arg` into its canonical, key-order independent string form.
///
/// Fails with [`CacheError::KeySerialization`](crate::errors::CacheError::KeySerialization)
/// when the value has no JSON representation, e.g. a map with non-string keys.
pub fn stable_serialize<A>(arg: &A) -> CacheResult<String>
where
    A: Serialize + ?Sized,
{
    let value = canonicalize(serde_json::to_value(arg)?);
    Ok(serde_json::to_string(&value)?)
}

/// Derives the cache key used by `read_with_param` and `reset_with_param`.
pub fn param_key<A>(prefix: &str, arg: &A) -> CacheResult<String>
where
    A: Serialize + ?Sized,
{
    let suffix = stable_serialize(arg)?;
    let mut key = String::with_capacity(prefix.len() + suffix.len());
    key.push_str(prefix);
    key.push_str(&suffix);
    Ok(key)
}

// Rebuilds objects in sorted order so the result does not depend on whether
// serde_json's `preserve_order` feature is enabled somewhere in the build.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
