//! Key-value persistence for settings, history and the rate cache.
//!
//! Each key holds one JSON blob wrapped in a `{ "version": n, "data": ... }`
//! envelope. Records are validated on load; anything that does not match
//! the expected schema falls back to the record's default.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TrcalcError};

/// Keys used by the calculator.
pub mod keys {
    pub const SETTINGS: &str = "trcalc-settings";
    pub const HISTORY: &str = "trcalc-history";
    pub const RATES: &str = "trcalc-rates";
}

/// Synchronous key-value store holding JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` if it was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a key, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// A record type persisted under a fixed key with a schema version.
pub trait Versioned: Serialize + DeserializeOwned {
    /// Storage key.
    const KEY: &'static str;
    /// Current schema version.
    const VERSION: u32;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct RawEnvelope {
    version: u32,
    data: Value,
}

/// Load a versioned record. `Ok(None)` when the key is absent.
pub fn load_versioned<T: Versioned>(store: &dyn KeyValueStore) -> Result<Option<T>> {
    let Some(value) = store.get(T::KEY)? else {
        return Ok(None);
    };

    let envelope: RawEnvelope = serde_json::from_value(value)?;
    if envelope.version != T::VERSION {
        return Err(TrcalcError::SchemaVersion {
            key: T::KEY.to_string(),
            found: envelope.version,
            expected: T::VERSION,
        });
    }

    Ok(Some(serde_json::from_value(envelope.data)?))
}

/// Load a versioned record, substituting the default when it is missing,
/// malformed or written by another schema version.
pub fn load_or_default<T: Versioned + Default>(store: &dyn KeyValueStore) -> T {
    match load_versioned::<T>(store) {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(key = T::KEY, "No persisted record, using default");
            T::default()
        }
        Err(e) => {
            warn!(key = T::KEY, code = e.error_code(), error = %e, "Discarding persisted record");
            T::default()
        }
    }
}

/// Persist a versioned record.
pub fn save_versioned<T: Versioned>(store: &dyn KeyValueStore, record: &T) -> Result<()> {
    let value = serde_json::to_value(EnvelopeRef {
        version: T::VERSION,
        data: record,
    })?;
    store.set(T::KEY, value)
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store keeping one `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TrcalcError::Storage {
                key: key.to_string(),
                message: "key must be non-empty and contain only [A-Za-z0-9_-]".to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&value)?)?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "Persisted record");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
