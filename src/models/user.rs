use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::db::{Bucket, Entity};

/// User record stored in the `users` bucket
///
/// `password` always holds an encoded Argon2id hash, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub chats: Vec<String>,
    #[serde(default)]
    pub shares: Vec<String>,
    /// Keys of the sessions issued to this user
    #[serde(default)]
    pub sessions: Vec<String>,
}

impl Entity for User {
    const BUCKET: Bucket = Bucket::Users;

    fn key(&self) -> String {
        self.username.clone()
    }
}

/// Public description of a user for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub username: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            username: user.username.clone(),
        }
    }
}

impl User {
    pub fn new(name: impl Into<String>, username: impl Into<String>, password_hash: String) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            password: password_hash,
            chats: Vec::new(),
            shares: Vec::new(),
            sessions: Vec::new(),
        }
    }

    /// Validate that a username is at least 3 ASCII alphanumeric characters
    pub fn validate_username(username: &str) -> bool {
        username.len() >= MIN_USERNAME_LENGTH && username.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Check a candidate password against the password policy
    pub fn validate_password(password: &str) -> Result<(), &'static str> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ERR_PASSWORD_TOO_SHORT);
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(ERR_PASSWORD_LOWERCASE);
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(ERR_PASSWORD_UPPERCASE);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(ERR_PASSWORD_NUMERIC);
        }
        if !password.chars().any(|c| c.is_ascii_punctuation()) {
            return Err(ERR_PASSWORD_SPECIAL);
        }
        Ok(())
    }

    pub fn has_chat(&self, id: &str) -> bool {
        self.chats.iter().any(|c| c == id)
    }

    /// Returns false when the chat was already linked
    pub fn add_chat(&mut self, id: &str) -> bool {
        add_unique(&mut self.chats, id)
    }

    pub fn remove_chat(&mut self, id: &str) -> bool {
        remove_value(&mut self.chats, id)
    }

    pub fn has_share(&self, path: &str) -> bool {
        self.shares.iter().any(|s| s == path)
    }

    pub fn add_share(&mut self, path: &str) -> bool {
        add_unique(&mut self.shares, path)
    }

    pub fn remove_share(&mut self, path: &str) -> bool {
        remove_value(&mut self.shares, path)
    }

    pub fn add_session(&mut self, key: &str) -> bool {
        add_unique(&mut self.sessions, key)
    }

    pub fn remove_session(&mut self, key: &str) -> bool {
        remove_value(&mut self.sessions, key)
    }
}

fn add_unique(set: &mut Vec<String>, value: &str) -> bool {
    if set.iter().any(|v| v == value) {
        return false;
    }
    set.push(value.to_string());
    true
}

fn remove_value(set: &mut Vec<String>, value: &str) -> bool {
    let before = set.len();
    set.retain(|v| v != value);
    set.len() != before
}
