//! Authorization and sharing service.
//!
//! Every storage operation here takes an already-resolved identity (see
//! `identity::AuthService::resolve`) and decides whether that identity may
//! touch the target object:
//! - uploads always land in the identity's own namespace,
//! - cross-owner reads require a grant in the requester's `shared_files`,
//! - grants are appended with one atomic conditional update on the target
//!   account, so racing shares cannot produce duplicates.
//!
//! A failed grant check and a genuinely missing object return the same
//! NotFound; callers cannot probe whether another user's file exists.

use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::Account;
use crate::storage::{list_by_prefix, object_key, owner_prefix, ObjectMeta, ObjectStore, RecordStore, Update};

fn not_found() -> AppError {
    AppError::not_found("not_found", "File not found")
}

pub struct FileService {
    objects: Arc<dyn ObjectStore>,
    accounts: Arc<dyn RecordStore<Account>>,
}

impl FileService {
    pub fn new(objects: Arc<dyn ObjectStore>, accounts: Arc<dyn RecordStore<Account>>) -> Self {
        Self { objects, accounts }
    }

    fn account_for(&self, identity: &str) -> AppResult<Account> {
        // Identities come from resolved sessions and accounts are never
        // deleted in normal operation, so a miss here is a store fault.
        self.accounts
            .get(identity)?
            .ok_or_else(|| AppError::internal("missing_account".to_string(), format!("No account record for {}", identity)))
    }

    /// Store `content` under the identity's own namespace. Upsert: re-upload
    /// of the same file name overwrites.
    pub fn upload(&self, identity: &str, file_name: &str, content: &[u8]) -> AppResult<()> {
        let key = object_key(identity, file_name);
        self.objects.put(&key, content)?;
        info!(key = %key, size = content.len(), "file.upload");
        Ok(())
    }

    /// Read an object. `owner: None` (or the identity itself) targets the
    /// identity's own namespace; any other owner requires a prior grant.
    pub fn fetch(&self, identity: &str, file_name: &str, owner: Option<&str>) -> AppResult<Vec<u8>> {
        let owner = owner.unwrap_or(identity);
        let key = object_key(owner, file_name);
        if owner != identity {
            let requester = self.account_for(identity)?;
            if !requester.shared_files.iter().any(|k| k == &key) {
                return Err(not_found());
            }
        }
        match self.objects.get(&key)? {
            Some(bytes) => Ok(bytes),
            None => Err(not_found()),
        }
    }

    /// Everything the identity can read: its own objects first (listing
    /// order), then objects shared with it (grant order). A key cannot be
    /// both self-owned and self-shared, so no deduplication is needed.
    pub fn list(&self, identity: &str) -> AppResult<Vec<ObjectMeta>> {
        let mut entries = list_by_prefix(self.objects.as_ref(), &owner_prefix(identity))?;
        let account = self.account_for(identity)?;
        for key in &account.shared_files {
            match self.objects.head(key)? {
                Some(meta) => entries.push(meta),
                // Grants are never revoked and owners never delete, so a
                // dangling grant means the object store lost data.
                None => {
                    return Err(AppError::internal(
                        "missing_shared_object".to_string(),
                        format!("Granted object {} is gone", key),
                    ))
                }
            }
        }
        Ok(entries)
    }

    /// Grant `target` read access to one of the identity's own files. The
    /// append requires, in a single conditional update, that the target
    /// account exists and does not already hold the grant; both violations
    /// collapse into one Conflict.
    pub fn share(&self, identity: &str, file_name: &str, target: &str) -> AppResult<()> {
        if target == identity {
            return Err(AppError::validation("self_share", "Already owner of the file"));
        }
        let key = object_key(identity, file_name);
        if self.objects.head(&key)?.is_none() {
            return Err(not_found());
        }
        let outcome = self.accounts.update_if(target, &mut |account| {
            if account.shared_files.iter().any(|k| k == &key) {
                return false;
            }
            account.shared_files.push(key.clone());
            true
        })?;
        match outcome {
            Update::Applied => {
                info!(key = %key, target = target, "file.share");
                Ok(())
            }
            Update::PreconditionFailed => {
                Err(AppError::conflict("share_rejected", "User not found or file already shared"))
            }
        }
    }
}
