//! Typed, schema-versioned records on top of a [`KeyValueStore`].
//!
//! Every record is written as `{"version": N, "data": ...}`. A stored value
//! without that envelope predates versioning and is read as version 0.
//! Older versions are upgraded one step at a time through
//! [`Record::upgrade`] before deserializing.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StorageError;
use crate::store::traits::KeyValueStore;

/// A value persisted under a fixed key with a schema version.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Storage key this record lives under.
    const KEY: &'static str;

    /// Current schema version written by this build.
    const VERSION: u32;

    /// Upgrade `data` stored at `version` to `version + 1`.
    fn upgrade(version: u32, data: Value) -> Result<Value, String> {
        let _ = version;
        Ok(data)
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn set_json<T>(kv: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + Sync + ?Sized,
{
    let text = serde_json::to_string(value).map_err(|e| serialization_error(key, e))?;
    kv.set_raw(key, &text).await
}

/// Read and deserialize the JSON stored under `key`.
pub async fn get_json<T>(kv: &dyn KeyValueStore, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
{
    match kv.get_raw(key).await? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| serialization_error(key, e)),
        None => Ok(None),
    }
}

/// Load a record, upgrading older schema versions.
pub async fn load<R: Record>(kv: &dyn KeyValueStore) -> Result<Option<R>, StorageError> {
    let Some(value) = get_json::<Value>(kv, R::KEY).await? else {
        return Ok(None);
    };

    let (mut version, mut data) = split_envelope(value);
    if version > R::VERSION {
        return Err(StorageError::UnsupportedVersion {
            key: R::KEY.to_string(),
            found: version,
            supported: R::VERSION,
        });
    }

    while version < R::VERSION {
        data = R::upgrade(version, data).map_err(|reason| {
            StorageError::Migration(format!(
                "{} v{} -> v{}: {reason}",
                R::KEY,
                version,
                version + 1
            ))
        })?;
        tracing::debug!(key = R::KEY, from = version, to = version + 1, "Upgraded record");
        version += 1;
    }

    serde_json::from_value(data)
        .map(Some)
        .map_err(|e| serialization_error(R::KEY, e))
}

/// Persist a record wrapped in its version envelope.
pub async fn save<R: Record>(kv: &dyn KeyValueStore, record: &R) -> Result<(), StorageError> {
    let data = serde_json::to_value(record).map_err(|e| serialization_error(R::KEY, e))?;
    let envelope = serde_json::json!({ "version": R::VERSION, "data": data });
    set_json(kv, R::KEY, &envelope).await
}

/// Delete a record. Returns whether it existed.
pub async fn delete<R: Record>(kv: &dyn KeyValueStore) -> Result<bool, StorageError> {
    kv.remove(R::KEY).await
}

fn split_envelope(value: Value) -> (u32, Value) {
    if let Value::Object(ref map) = value {
        if map.len() == 2 && map.contains_key("data") {
            if let Some(version) = map
                .get("version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
            {
                let data = map.get("data").cloned().unwrap_or(Value::Null);
                return (version, data);
            }
        }
    }
    (0, value)
}

fn serialization_error(key: &str, e: serde_json::Error) -> StorageError {
    StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    }
}
