//! Keyed record stores with atomic conditional writes.
//!
//! The `RecordStore` trait is the narrow contract the auth and sharing
//! services program against. Both implementations serialize each mutation
//! under one table-wide lock, so check-and-insert and check-and-update are
//! indivisible: two concurrent registrations of the same username, or two
//! concurrent shares of the same file to the same target, cannot both win.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::StoreError;

/// Outcome of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Put {
    Inserted,
    AlreadyExists,
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Applied,
    PreconditionFailed,
}

/// A keyed table of records with conditional-write primitives.
///
/// `update_if` runs the closure against a copy of the stored record; the
/// mutation is committed only when the closure returns true, so a rejected
/// precondition leaves no partial state behind. A missing key is also a
/// `PreconditionFailed`.
pub trait RecordStore<R>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<R>, StoreError>;
    fn put_if_absent(&self, key: &str, record: R) -> Result<Put, StoreError>;
    fn update_if(&self, key: &str, apply: &mut dyn FnMut(&mut R) -> bool) -> Result<Update, StoreError>;
    /// Idempotent: deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local record table. Used for sessions, which do not survive a
/// restart.
pub struct MemKv<R> {
    map: RwLock<HashMap<String, R>>,
}

impl<R> MemKv<R> {
    pub fn new() -> Self {
        Self { map: RwLock::new(HashMap::new()) }
    }
}

impl<R> Default for MemKv<R> {
    fn default() -> Self { Self::new() }
}

impl<R: Clone + Send + Sync> RecordStore<R> for MemKv<R> {
    fn get(&self, key: &str) -> Result<Option<R>, StoreError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put_if_absent(&self, key: &str, record: R) -> Result<Put, StoreError> {
        let mut map = self.map.write();
        if map.contains_key(key) {
            return Ok(Put::AlreadyExists);
        }
        map.insert(key.to_string(), record);
        Ok(Put::Inserted)
    }

    fn update_if(&self, key: &str, apply: &mut dyn FnMut(&mut R) -> bool) -> Result<Update, StoreError> {
        let mut map = self.map.write();
        let Some(current) = map.get(key) else {
            return Ok(Update::PreconditionFailed);
        };
        let mut candidate = current.clone();
        if !apply(&mut candidate) {
            return Ok(Update::PreconditionFailed);
        }
        map.insert(key.to_string(), candidate);
        Ok(Update::Applied)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.map.write().remove(key);
        Ok(())
    }
}

/// Record table persisted as one JSON file under the data root. The whole
/// table is held in memory and rewritten (temp file + rename) on every
/// mutation, while the table lock is held. Used for accounts.
pub struct JsonKv<R> {
    path: PathBuf,
    map: Mutex<HashMap<String, R>>,
}

impl<R: Clone + Serialize + DeserializeOwned> JsonKv<R> {
    /// Open the table at `path`, loading any existing snapshot.
    pub fn load_or_default(path: PathBuf) -> Result<Self, StoreError> {
        let map = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<HashMap<String, R>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, map: Mutex::new(map) })
    }

    fn persist(&self, map: &HashMap<String, R>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// A failed persist must not leave the in-memory table ahead of its snapshot:
// each mutator rolls its change back on error, so a failed operation is not
// observable via `get` and does not block a later retry.
impl<R: Clone + Serialize + DeserializeOwned + Send + Sync> RecordStore<R> for JsonKv<R> {
    fn get(&self, key: &str) -> Result<Option<R>, StoreError> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn put_if_absent(&self, key: &str, record: R) -> Result<Put, StoreError> {
        let mut map = self.map.lock();
        if map.contains_key(key) {
            return Ok(Put::AlreadyExists);
        }
        map.insert(key.to_string(), record);
        if let Err(e) = self.persist(&map) {
            map.remove(key);
            return Err(e);
        }
        Ok(Put::Inserted)
    }

    fn update_if(&self, key: &str, apply: &mut dyn FnMut(&mut R) -> bool) -> Result<Update, StoreError> {
        let mut map = self.map.lock();
        let Some(current) = map.get(key).cloned() else {
            return Ok(Update::PreconditionFailed);
        };
        let mut candidate = current.clone();
        if !apply(&mut candidate) {
            return Ok(Update::PreconditionFailed);
        }
        map.insert(key.to_string(), candidate);
        if let Err(e) = self.persist(&map) {
            map.insert(key.to_string(), current);
            return Err(e);
        }
        Ok(Update::Applied)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.lock();
        if let Some(previous) = map.remove(key) {
            if let Err(e) = self.persist(&map) {
                map.insert(key.to_string(), previous);
                return Err(e);
            }
        }
        Ok(())
    }
}
