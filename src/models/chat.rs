use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Bucket, Entity};

/// Two-party conversation stored in the `chats` bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user1: String,
    pub user2: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// One entry of a chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub text: String,
    /// When the message was sent (Unix timestamp)
    pub sent_at: i64,
}

/// Chat description for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: Uuid,
    pub user1: String,
    pub user2: String,
    pub last_message: Option<Message>,
}

impl Entity for Chat {
    const BUCKET: Bucket = Bucket::Chats;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Chat {
    pub fn new(user1: impl Into<String>, user2: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user1: user1.into(),
            user2: user2.into(),
            messages: Vec::new(),
        }
    }

    pub fn is_participant(&self, username: &str) -> bool {
        self.user1 == username || self.user2 == username
    }

    /// The participant that is not `username`
    pub fn peer_of(&self, username: &str) -> &str {
        if self.user1 == username {
            &self.user2
        } else {
            &self.user1
        }
    }

    pub fn add_message(&mut self, sender: &str, text: &str, sent_at: i64) -> Message {
        let message = Message {
            sender: sender.to_string(),
            text: text.to_string(),
            sent_at,
        };
        self.messages.push(message.clone());
        message
    }

    pub fn remove_message(&mut self, index: usize) -> Option<Message> {
        if index < self.messages.len() {
            Some(self.messages.remove(index))
        } else {
            None
        }
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id,
            user1: self.user1.clone(),
            user2: self.user2.clone(),
            last_message: self.messages.last().cloned(),
        }
    }
}
