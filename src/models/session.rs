use serde::{Deserialize, Serialize};

use crate::db::{Bucket, Entity};

/// Session record stored in the `sessions` bucket, keyed by selector
///
/// Holds a reference to the owning user rather than a copy of it. The
/// secret half of the token is only kept as a SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub selector: String,
    pub username: String,
    pub verifier_hash: String,
    /// When the session was issued (Unix timestamp)
    pub created_at: i64,
    /// When the session stops being accepted (Unix timestamp)
    pub expires_at: i64,
}

impl Entity for Session {
    const BUCKET: Bucket = Bucket::Sessions;

    fn key(&self) -> String {
        self.selector.clone()
    }
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
