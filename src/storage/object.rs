//! Filesystem-backed object store with paginated prefix listing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::paths::key_to_path;
use super::StoreError;

/// Metadata for one stored object. `modified` renders as RFC 3339 in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// One page of a prefix listing. `next_after` is the cursor for the next
/// page, or None when the listing is exhausted.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub entries: Vec<ObjectMeta>,
    pub next_after: Option<String>,
}

/// Namespaced blob storage. Keys are `"<owner>/<file>"`; `put` is an upsert.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError>;
    fn list_page(&self, prefix: &str, start_after: Option<&str>) -> Result<ListPage, StoreError>;
}

/// Drain every page of a prefix listing into one materialized sequence, so
/// callers never have to care about the store's page limit.
pub fn list_by_prefix(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
    let mut out = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = store.list_page(prefix, after.as_deref())?;
        out.extend(page.entries);
        match page.next_after {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }
    Ok(out)
}

/// Object store rooted at a folder under the data root. Listing order is
/// lexicographic over keys, which keeps pagination cursors stable.
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, page_size: 1000 })
    }

    /// Override the listing page limit. Tests use small pages to exercise
    /// cursor handling.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn meta_for(&self, key: &str, path: &Path) -> Result<ObjectMeta, StoreError> {
        let md = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = md.modified()?.into();
        Ok(ObjectMeta { key: key.to_string(), size: md.len(), modified })
    }

    /// Collect every object key under the root, sorted lexicographically.
    fn collect_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut stack = vec![(self.root.clone(), String::new())];
        while let Some((dir, rel)) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let child_rel = if rel.is_empty() { name } else { format!("{}/{}", rel, name) };
                let ft = entry.file_type()?;
                if ft.is_dir() {
                    stack.push((entry.path(), child_rel));
                } else if ft.is_file() {
                    keys.push(child_rel);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = key_to_path(&self.root, key)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write to a dot-prefixed sibling and rename, so readers and the
        // lister never observe a half-written object.
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = key_to_path(&self.root, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let path = key_to_path(&self.root, key)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(self.meta_for(key, &path)?))
    }

    fn list_page(&self, prefix: &str, start_after: Option<&str>) -> Result<ListPage, StoreError> {
        let keys = self.collect_keys()?;
        let mut matched = keys
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .skip_while(|k| start_after.map(|a| k.as_str() <= a).unwrap_or(false));
        let mut entries = Vec::with_capacity(self.page_size);
        for key in matched.by_ref().take(self.page_size) {
            let path = key_to_path(&self.root, &key)?;
            entries.push(self.meta_for(&key, &path)?);
        }
        let next_after = if matched.next().is_some() {
            entries.last().map(|m| m.key.clone())
        } else {
            None
        };
        Ok(ListPage { entries, next_after })
    }
}
