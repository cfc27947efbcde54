//! Object key construction and key-to-path mapping.
//!
//! Invariant: the owner of an object is the first path segment of its key.
//! Every object key in the codebase is assembled here.

use std::path::{Path, PathBuf};

use super::StoreError;

/// Build the fully qualified object key for a file in `owner`'s namespace.
pub fn object_key(owner: &str, file_name: &str) -> String {
    format!("{}/{}", owner, file_name)
}

/// The key prefix under which all of `owner`'s own objects live.
pub fn owner_prefix(owner: &str) -> String {
    format!("{}/", owner)
}

/// Resolve an object key to a path under `root`.
///
/// Keys must have at least an owner segment and a file segment. Empty,
/// dot-prefixed and backslash-carrying segments are rejected so a key can
/// never escape the root (dot-prefixed names are also reserved for the
/// store's temp files).
pub(crate) fn key_to_path(root: &Path, key: &str) -> Result<PathBuf, StoreError> {
    let mut path = root.to_path_buf();
    let mut segments = 0usize;
    for seg in key.split('/') {
        if seg.is_empty() || seg.starts_with('.') || seg.contains('\\') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        path.push(seg);
        segments += 1;
    }
    if segments < 2 {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_first_segment() {
        assert_eq!(object_key("alice", "a.txt"), "alice/a.txt");
        assert!(object_key("alice", "notes/a.txt").starts_with(&owner_prefix("alice")));
    }

    #[test]
    fn traversal_keys_rejected() {
        let root = Path::new("/data/objects");
        assert!(key_to_path(root, "alice/../bob/a.txt").is_err());
        assert!(key_to_path(root, "alice//a.txt").is_err());
        assert!(key_to_path(root, "alice/.hidden").is_err());
        assert!(key_to_path(root, "alice").is_err());
        assert!(key_to_path(root, r"alice\..\a.txt").is_err());
        assert!(key_to_path(root, "alice/a.txt").is_ok());
    }
}
