use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{share::owner_of, Share, User};
use crate::services::relations::RelationshipManager;
use crate::services::sandbox::{Download, FileSandbox, TenantPath};

/// Per-file access lists for files shared with other users
#[derive(Clone)]
pub struct ShareController {
    store: EntityStore,
    sandbox: FileSandbox,
    relations: RelationshipManager,
}

impl ShareController {
    pub fn new(store: EntityStore, sandbox: FileSandbox, relations: RelationshipManager) -> Self {
        Self {
            store,
            sandbox,
            relations,
        }
    }

    /// Share one of `owner`'s files with `viewer`
    pub fn create(&self, owner: &str, virtual_path: &str, viewer: &str) -> Result<String> {
        let path = self.sandbox.resolve(owner, virtual_path)?;
        let metadata = self.sandbox.metadata(&path)?;
        if metadata.is_dir() {
            return Err(AppError::invalid("cannot share directory"));
        }

        if viewer == owner {
            return Err(AppError::invalid("cannot share a file with yourself"));
        }
        if self.store.find::<User>(viewer)?.is_none() {
            return Err(AppError::UserNotFound);
        }

        let key = path.namespaced();
        if !self.relations.link_share(&key, viewer)? {
            return Err(AppError::AlreadyShared);
        }

        tracing::info!("{} shared {} with {}", owner, key, viewer);
        Ok(key)
    }

    /// Whether `requester` may read the file behind a share key
    ///
    /// The owner always may, with or without a share record. Anyone else
    /// must be on the share's access list and hold the share in their own
    /// share set.
    pub fn authorize_view(&self, path: &str, requester: &str) -> Result<bool> {
        if owner_of(path) == requester {
            return Ok(true);
        }

        let listed = self
            .store
            .find::<Share>(path)?
            .map(|share| share.has_viewer(requester))
            .unwrap_or(false);
        if !listed {
            return Ok(false);
        }
        self.relations.is_share_viewer(requester, path)
    }

    /// Viewer list of a share; only the owner may see it
    pub fn describe(&self, path: &str, requester: &str) -> Result<Vec<String>> {
        if owner_of(path) != requester {
            return Err(AppError::forbidden("cannot describe file"));
        }

        self.store
            .find::<Share>(path)?
            .map(|share| share.to)
            .ok_or(AppError::ShareNotFound)
    }

    /// Resolve a shared file for `requester` to download
    pub fn download(&self, owner: &str, virtual_path: &str, requester: &str) -> Result<Download> {
        let path = self.sandbox.resolve(owner, virtual_path)?;
        self.sandbox.metadata(&path)?;

        let key = path.namespaced();
        if !self.authorize_view(&key, requester)? {
            return Err(AppError::forbidden("file not shared with requesting user"));
        }

        self.sandbox.download(&path)
    }

    /// Share keys of the files shared with `username`
    pub fn shared_with(&self, username: &str) -> Result<Vec<String>> {
        self.relations.shares_of(username)
    }

    /// Take `viewer` off the access list; the share disappears with its last viewer
    pub fn remove_viewer(&self, requester: &str, path: &str, viewer: &str) -> Result<()> {
        self.require_owned_share(requester, path)?;

        if !self.relations.unlink_share(path, viewer)? {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    /// Delete a share and every viewer's reference to it
    pub fn delete_share(&self, requester: &str, path: &str) -> Result<()> {
        let share = self.require_owned_share(requester, path)?;
        self.drop_share(&share)
    }

    /// Delete every share on `path` or beneath it
    ///
    /// Called when the underlying file or directory goes away or moves.
    pub fn forget_path(&self, path: &TenantPath) -> Result<usize> {
        let key = path.namespaced();
        let mut dropped = 0;

        if let Some(share) = self.store.find::<Share>(&key)? {
            self.drop_share(&share)?;
            dropped += 1;
        }
        for share in self.store.scan::<Share>(&format!("{}/", key))? {
            self.drop_share(&share)?;
            dropped += 1;
        }

        if dropped > 0 {
            tracing::info!("Dropped {} share(s) under {}", dropped, key);
        }
        Ok(dropped)
    }

    fn require_owned_share(&self, requester: &str, path: &str) -> Result<Share> {
        if owner_of(path) != requester {
            return Err(AppError::forbidden("requesting user does not own link share"));
        }
        self.store
            .find::<Share>(path)?
            .ok_or(AppError::ShareNotFound)
    }

    fn drop_share(&self, share: &Share) -> Result<()> {
        for viewer in &share.to {
            self.relations.unlink_share(&share.path, viewer)?;
        }
        // Covers a share whose viewer list was already empty
        self.store.remove::<Share>(&share.path)
    }
}
