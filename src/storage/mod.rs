//!
//! cubby storage module
//! --------------------
//! This module implements the two store contracts the service is built on:
//!
//! - `RecordStore<R>`: a keyed record table with atomic conditional writes
//!   (`put_if_absent`, `update_if`). Accounts and sessions live here, and
//!   every uniqueness invariant (one account per username, one session per
//!   token, no duplicate share grants) rests on these primitives rather than
//!   on read-modify-write sequences in the services.
//! - `ObjectStore`: namespaced blob storage keyed by `"<owner>/<file>"` with
//!   put/get/head and paginated prefix listing.
//!
//! Two `RecordStore` implementations are provided: `MemKv` (process-local,
//! used for sessions) and `JsonKv` (same map persisted to a JSON file under
//! the data root, used for accounts). The object store is filesystem-backed
//! (`FsObjectStore`) under the configured data root.
//!
//! The owner of an object is always the first path segment of its key. Key
//! construction is centralized in `paths::object_key`; nothing else in the
//! codebase assembles object keys by hand.

use thiserror::Error;

pub mod kv;
pub mod object;
pub mod paths;

pub use kv::{JsonKv, MemKv, Put, RecordStore, Update};
pub use object::{list_by_prefix, FsObjectStore, ListPage, ObjectMeta, ObjectStore};
pub use paths::{object_key, owner_prefix};

/// Faults raised by the store layer. `InvalidKey` is the only variant callers
/// are expected to branch on; the rest surface as internal errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
}
