use serde::{Deserialize, Serialize};

use crate::db::{Bucket, Entity};

/// Link-based grant on a single file, keyed by `<owner>/<relative path>`
///
/// The owner is the first path segment and is not stored separately.
/// A share always has at least one viewer; removing the last one deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub path: String,
    #[serde(default)]
    pub to: Vec<String>,
}

impl Entity for Share {
    const BUCKET: Bucket = Bucket::Shares;

    fn key(&self) -> String {
        self.path.clone()
    }
}

impl Share {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            to: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        owner_of(&self.path)
    }

    pub fn has_viewer(&self, username: &str) -> bool {
        self.to.iter().any(|u| u == username)
    }

    pub fn add_viewer(&mut self, username: &str) -> bool {
        if self.has_viewer(username) {
            return false;
        }
        self.to.push(username.to_string());
        true
    }

    pub fn remove_viewer(&mut self, username: &str) -> bool {
        let before = self.to.len();
        self.to.retain(|u| u != username);
        self.to.len() != before
    }
}

/// Owning tenant of a share key
pub fn owner_of(path: &str) -> &str {
    path.split('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_derived_from_path() {
        let share = Share::new("alice/docs/notes.txt");
        assert_eq!(share.owner(), "alice");
        assert_eq!(owner_of("bob"), "bob");
    }

    #[test]
    fn test_viewers() {
        let mut share = Share::new("alice/notes.txt");
        assert!(share.add_viewer("bob"));
        assert!(!share.add_viewer("bob"));
        assert!(share.has_viewer("bob"));

        assert!(share.remove_viewer("bob"));
        assert!(!share.remove_viewer("bob"));
        assert!(share.to.is_empty());
    }
}
