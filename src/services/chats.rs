use chrono::Utc;
use uuid::Uuid;

use crate::constants::ERR_INVALID_CHAT_ID;
use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{Chat, ChatSummary, Message, User};
use crate::services::relations::RelationshipManager;

/// Two-party conversations between users
#[derive(Clone)]
pub struct ChatService {
    store: EntityStore,
    relations: RelationshipManager,
}

impl ChatService {
    pub fn new(store: EntityStore, relations: RelationshipManager) -> Self {
        Self { store, relations }
    }

    /// Open a chat from `from` to `to` with its first message
    pub fn create(&self, from: &str, to: &str, text: &str) -> Result<ChatSummary> {
        if from == to {
            return Err(AppError::invalid("cannot create a chat with yourself"));
        }
        if text.trim().is_empty() {
            return Err(AppError::invalid("message cannot be empty"));
        }
        if self.store.find::<User>(to)?.is_none() {
            return Err(AppError::UserNotFound);
        }

        let mut chat = Chat::new(from, to);
        chat.add_message(from, text, Utc::now().timestamp());
        self.store.save(&chat)?;

        // A partial link stays as written; reads repair it and delete clears it
        let id = chat.id.to_string();
        self.relations.link_chat(&id, from, to)?;

        tracing::info!("Chat {} created between {} and {}", id, from, to);
        Ok(chat.summary())
    }

    /// Summaries of every chat `username` takes part in
    pub fn list(&self, username: &str) -> Result<Vec<ChatSummary>> {
        let mut summaries = Vec::new();
        for id in self.relations.chats_of(username)? {
            if let Some(chat) = self.store.find::<Chat>(&id)? {
                summaries.push(chat.summary());
            }
        }
        Ok(summaries)
    }

    pub fn describe(&self, username: &str, chat_id: &str) -> Result<ChatSummary> {
        Ok(self.load_member_chat(username, chat_id)?.summary())
    }

    /// Delete a chat for both participants
    pub fn delete(&self, username: &str, chat_id: &str) -> Result<()> {
        let chat = self.load_member_chat(username, chat_id)?;
        self.relations.unlink_chat(&chat)?;
        tracing::info!("Chat {} deleted by {}", chat.id, username);
        Ok(())
    }

    pub fn messages(&self, username: &str, chat_id: &str) -> Result<Vec<Message>> {
        Ok(self.load_member_chat(username, chat_id)?.messages)
    }

    /// Append a message from `username`
    pub fn send(&self, username: &str, chat_id: &str, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(AppError::invalid("message cannot be empty"));
        }
        let chat = self.load_member_chat(username, chat_id)?;

        self.store
            .modify::<Chat, _, _>(&chat.id.to_string(), |chat| {
                Ok(chat.add_message(username, text, Utc::now().timestamp()))
            })?
            .ok_or(AppError::ChatNotFound)
    }

    /// Remove the message at `index`; only its sender may do so
    pub fn remove_message(&self, username: &str, chat_id: &str, index: usize) -> Result<Message> {
        let chat = self.load_member_chat(username, chat_id)?;

        self.store
            .modify::<Chat, _, _>(&chat.id.to_string(), |chat| {
                let sender = chat
                    .messages
                    .get(index)
                    .map(|m| m.sender.clone())
                    .ok_or_else(|| AppError::invalid("message index out of range"))?;
                if sender != username {
                    return Err(AppError::forbidden("cannot remove another user's message"));
                }
                chat.remove_message(index)
                    .ok_or_else(|| AppError::invalid("message index out of range"))
            })?
            .ok_or(AppError::ChatNotFound)
    }

    /// Load a chat, checking the requester belongs to it
    ///
    /// Membership is checked against both the user's own chat set and the
    /// chat's participants.
    fn load_member_chat(&self, username: &str, chat_id: &str) -> Result<Chat> {
        let id = parse_chat_id(chat_id)?;
        let chat = self
            .store
            .find::<Chat>(&id)?
            .ok_or(AppError::ChatNotFound)?;

        if !chat.is_participant(username) || !self.relations.is_chat_member(username, &id)? {
            return Err(AppError::forbidden("user not in specified chat"));
        }
        Ok(chat)
    }
}

/// Normalize a client-supplied chat id to its stored form
fn parse_chat_id(raw: &str) -> Result<String> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| AppError::invalid(ERR_INVALID_CHAT_ID))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::Arc;

    fn setup() -> (EntityStore, ChatService) {
        let store = EntityStore::new(Arc::new(MemoryStore::new()));
        for name in ["alice", "bob", "carol"] {
            store
                .save(&User::new(name, name, "hash".to_string()))
                .unwrap();
        }
        let relations = RelationshipManager::new(store.clone());
        (store.clone(), ChatService::new(store, relations))
    }

    #[test]
    fn test_create_links_both_participants() {
        let (store, chats) = setup();
        let summary = chats.create("alice", "bob", "hi bob").unwrap();
        let id = summary.id.to_string();

        assert_eq!(summary.last_message.unwrap().text, "hi bob");
        assert!(store.find::<User>("alice").unwrap().unwrap().has_chat(&id));
        assert!(store.find::<User>("bob").unwrap().unwrap().has_chat(&id));

        assert_eq!(chats.list("bob").unwrap().len(), 1);
        assert!(chats.list("carol").unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (_, chats) = setup();
        assert!(matches!(
            chats.create("alice", "alice", "hi"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            chats.create("alice", "ghost", "hi"),
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            chats.create("alice", "bob", "   "),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_outsider_is_forbidden() {
        let (_, chats) = setup();
        let id = chats.create("alice", "bob", "hi").unwrap().id.to_string();

        assert!(matches!(
            chats.describe("carol", &id),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            chats.send("carol", &id, "let me in"),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            chats.delete("carol", &id),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unknown_and_malformed_ids() {
        let (_, chats) = setup();
        assert!(matches!(
            chats.describe("alice", "not-a-uuid"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            chats.describe("alice", &Uuid::new_v4().to_string()),
            Err(AppError::ChatNotFound)
        ));
    }

    #[test]
    fn test_send_and_remove_messages() {
        let (_, chats) = setup();
        let id = chats.create("alice", "bob", "hi").unwrap().id.to_string();

        chats.send("bob", &id, "hello alice").unwrap();
        let messages = chats.messages("alice", &id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, "bob");

        assert!(matches!(
            chats.remove_message("alice", &id, 1),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            chats.remove_message("alice", &id, 9),
            Err(AppError::InvalidInput(_))
        ));

        let removed = chats.remove_message("bob", &id, 1).unwrap();
        assert_eq!(removed.text, "hello alice");
        assert_eq!(chats.messages("bob", &id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_chat_for_both() {
        let (store, chats) = setup();
        let id = chats.create("alice", "bob", "hi").unwrap().id.to_string();

        chats.delete("bob", &id).unwrap();

        assert!(store.find::<Chat>(&id).unwrap().is_none());
        assert!(chats.list("alice").unwrap().is_empty());
        assert!(chats.list("bob").unwrap().is_empty());
        assert!(matches!(
            chats.describe("alice", &id),
            Err(AppError::ChatNotFound)
        ));
    }

    #[test]
    fn test_half_linked_chat_can_be_deleted_by_remaining_member() {
        let (store, chats) = setup();
        let id = chats.create("alice", "bob", "hi").unwrap().id.to_string();

        // Peer disappeared after only the sender's edge survived
        store.remove::<User>("bob").unwrap();

        assert_eq!(chats.list("alice").unwrap().len(), 1);
        chats.delete("alice", &id).unwrap();
        assert!(store.find::<Chat>(&id).unwrap().is_none());
        assert!(chats.list("alice").unwrap().is_empty());
    }

    #[test]
    fn test_uppercase_id_resolves() {
        let (_, chats) = setup();
        let id = chats.create("alice", "bob", "hi").unwrap().id.to_string();
        let summary = chats.describe("alice", &id.to_uppercase()).unwrap();
        assert_eq!(summary.id.to_string(), id);
    }
}
