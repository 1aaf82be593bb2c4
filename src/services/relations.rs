//! Bidirectional edges between users and the chats and shares they belong to.
//!
//! The store has no multi-key transactions, so each edge change is a
//! sequence of single-record atomic updates. If a step fails the earlier
//! steps stay applied; every operation here is idempotent, so re-running it
//! (or the repair pass done when memberships are read) converges on a
//! symmetric state.

use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{Chat, Share, User};

#[derive(Clone)]
pub struct RelationshipManager {
    store: EntityStore,
}

impl RelationshipManager {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    // =========================================================================
    // Chats
    // =========================================================================

    /// Add `chat_id` to both participants' membership sets
    pub fn link_chat(&self, chat_id: &str, user_a: &str, user_b: &str) -> Result<()> {
        for username in [user_a, user_b] {
            self.store
                .modify::<User, _, _>(username, |user| Ok(user.add_chat(chat_id)))?
                .ok_or(AppError::UserNotFound)?;
        }
        Ok(())
    }

    /// Remove the chat from both participants, then delete the chat itself
    ///
    /// A participant that no longer exists or no longer lists the chat is
    /// skipped.
    pub fn unlink_chat(&self, chat: &Chat) -> Result<()> {
        let chat_id = chat.id.to_string();
        for username in [chat.user1.as_str(), chat.user2.as_str()] {
            self.store
                .modify::<User, _, _>(username, |user| Ok(user.remove_chat(&chat_id)))?;
        }
        self.store.remove::<Chat>(&chat_id)
    }

    /// Whether `username` lists `chat_id` in their own membership set
    pub fn is_chat_member(&self, username: &str, chat_id: &str) -> Result<bool> {
        Ok(self
            .store
            .find::<User>(username)?
            .map(|user| user.has_chat(chat_id))
            .unwrap_or(false))
    }

    /// Chat ids of a user, dropping references to chats that no longer exist
    /// or no longer include the user
    pub fn chats_of(&self, username: &str) -> Result<Vec<String>> {
        let user = self
            .store
            .find::<User>(username)?
            .ok_or(AppError::UserNotFound)?;

        let mut dangling = Vec::new();
        for chat_id in &user.chats {
            let linked = self
                .store
                .find::<Chat>(chat_id)?
                .map(|chat| chat.is_participant(username))
                .unwrap_or(false);
            if !linked {
                dangling.push(chat_id.clone());
            }
        }

        if dangling.is_empty() {
            return Ok(user.chats);
        }

        tracing::warn!(
            "Repairing {} dangling chat reference(s) for {}",
            dangling.len(),
            username
        );
        let repaired = self.store.modify::<User, _, _>(username, |user| {
            for chat_id in &dangling {
                user.remove_chat(chat_id);
            }
            Ok(user.chats.clone())
        })?;
        Ok(repaired.unwrap_or_default())
    }

    // =========================================================================
    // Shares
    // =========================================================================

    /// Grant `viewer` access to the share at `path`, creating the share if needed
    ///
    /// The user's edge goes first, so a viewer that no longer exists never
    /// lands on the access list. Returns false when the viewer was already
    /// listed; the user side is still written so a half-applied earlier link
    /// heals.
    pub fn link_share(&self, path: &str, viewer: &str) -> Result<bool> {
        self.store
            .modify::<User, _, _>(viewer, |user| Ok(user.add_share(path)))?
            .ok_or(AppError::UserNotFound)?;

        self.store.update::<Share, _, _>(path, |current| {
            let mut share = current.unwrap_or_else(|| Share::new(path));
            let added = share.add_viewer(viewer);
            Ok((Some(share), added))
        })
    }

    /// Revoke `viewer`'s access to `path`
    ///
    /// The user's edge goes first. A share left without viewers is deleted.
    pub fn unlink_share(&self, path: &str, viewer: &str) -> Result<bool> {
        self.store
            .modify::<User, _, _>(viewer, |user| Ok(user.remove_share(path)))?;

        self.store.update::<Share, _, _>(path, |current| match current {
            Some(mut share) => {
                let removed = share.remove_viewer(viewer);
                if share.to.is_empty() {
                    Ok((None, removed))
                } else {
                    Ok((Some(share), removed))
                }
            }
            None => Ok((None, false)),
        })
    }

    /// Whether `username` lists `path` in their own share set
    pub fn is_share_viewer(&self, username: &str, path: &str) -> Result<bool> {
        Ok(self
            .store
            .find::<User>(username)?
            .map(|user| user.has_share(path))
            .unwrap_or(false))
    }

    /// Paths shared with a user, dropping references the share no longer backs
    pub fn shares_of(&self, username: &str) -> Result<Vec<String>> {
        let user = self
            .store
            .find::<User>(username)?
            .ok_or(AppError::UserNotFound)?;

        let mut dangling = Vec::new();
        for path in &user.shares {
            let linked = self
                .store
                .find::<Share>(path)?
                .map(|share| share.has_viewer(username))
                .unwrap_or(false);
            if !linked {
                dangling.push(path.clone());
            }
        }

        if dangling.is_empty() {
            return Ok(user.shares);
        }

        tracing::warn!(
            "Repairing {} dangling share reference(s) for {}",
            dangling.len(),
            username
        );
        let repaired = self.store.modify::<User, _, _>(username, |user| {
            for path in &dangling {
                user.remove_share(path);
            }
            Ok(user.shares.clone())
        })?;
        Ok(repaired.unwrap_or_default())
    }
}
