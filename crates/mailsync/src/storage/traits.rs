//! Storage trait definitions

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Durable client-local key-value store.
///
/// Written by the selection state and the draft engine. Both use
/// item- or context-scoped keys (see [`super::keys`]), so writers never
/// contend for the same entry.
pub trait KvStore: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// List all keys starting with `prefix`, in ascending order
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read and decode a JSON value
pub fn load_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to decode stored value for {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode a value as JSON and store it
pub fn save_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
