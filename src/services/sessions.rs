use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::constants::{SESSION_SELECTOR_BYTES, SESSION_TTL_HOURS, SESSION_VERIFIER_BYTES};
use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::Session;

/// Opaque credential handed to the client
///
/// The selector locates the session record; the verifier is the secret,
/// stored server-side only as a SHA-256 digest and compared in constant time.
#[derive(Clone)]
pub struct SessionToken {
    selector: [u8; SESSION_SELECTOR_BYTES],
    verifier: [u8; SESSION_VERIFIER_BYTES],
}

impl SessionToken {
    pub fn generate() -> Self {
        let mut selector = [0u8; SESSION_SELECTOR_BYTES];
        let mut verifier = [0u8; SESSION_VERIFIER_BYTES];
        OsRng.fill_bytes(&mut selector);
        OsRng.fill_bytes(&mut verifier);
        Self { selector, verifier }
    }

    /// Decode a token presented by a client
    pub fn parse(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|_| AppError::MalformedToken)?;
        if bytes.len() != SESSION_SELECTOR_BYTES + SESSION_VERIFIER_BYTES {
            return Err(AppError::MalformedToken);
        }

        let (selector_bytes, verifier_bytes) = bytes.split_at(SESSION_SELECTOR_BYTES);
        let mut selector = [0u8; SESSION_SELECTOR_BYTES];
        let mut verifier = [0u8; SESSION_VERIFIER_BYTES];
        selector.copy_from_slice(selector_bytes);
        verifier.copy_from_slice(verifier_bytes);

        Ok(Self { selector, verifier })
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(SESSION_SELECTOR_BYTES + SESSION_VERIFIER_BYTES);
        bytes.extend_from_slice(&self.selector);
        bytes.extend_from_slice(&self.verifier);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Store key of the session this token refers to
    pub fn key(&self) -> String {
        hex::encode(self.selector)
    }

    fn verifier_digest(&self) -> [u8; 32] {
        Sha256::digest(self.verifier).into()
    }

    fn matches(&self, session: &Session) -> bool {
        match hex::decode(&session.verifier_hash) {
            Ok(stored) => self.verifier_digest().ct_eq(&stored).into(),
            Err(_) => false,
        }
    }
}

/// A freshly created session together with the token to return to the client
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// Issues, resolves and revokes sessions
#[derive(Clone)]
pub struct SessionManager {
    store: EntityStore,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: EntityStore) -> Self {
        Self::with_ttl(store, Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn with_ttl(store: EntityStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Persist a new session for `username`
    ///
    /// The user's own session list is not touched here.
    pub fn create(&self, username: &str) -> Result<IssuedSession> {
        let token = SessionToken::generate();
        let now = Utc::now().timestamp();

        let session = Session {
            selector: token.key(),
            username: username.to_string(),
            verifier_hash: hex::encode(token.verifier_digest()),
            created_at: now,
            expires_at: now + self.ttl.num_seconds(),
        };
        self.store.save(&session)?;

        Ok(IssuedSession {
            token: token.encode(),
            session,
        })
    }

    /// Resolve a presented token to its live session
    pub fn find(&self, token: &str) -> Result<Session> {
        let token = SessionToken::parse(token)?;
        let key = token.key();

        let session = self
            .store
            .find::<Session>(&key)?
            .ok_or(AppError::SessionNotFound)?;

        if !token.matches(&session) {
            return Err(AppError::SessionNotFound);
        }

        if session.is_expired(Utc::now().timestamp()) {
            tracing::info!("Discarding expired session for {}", session.username);
            self.store.remove::<Session>(&key)?;
            return Err(AppError::SessionNotFound);
        }

        Ok(session)
    }

    /// Revoke the session behind `token`, returning it if it existed
    ///
    /// Unknown or malformed tokens are not an error.
    pub fn delete(&self, token: &str) -> Result<Option<Session>> {
        let Ok(token) = SessionToken::parse(token) else {
            return Ok(None);
        };

        self.store
            .update::<Session, _, _>(&token.key(), |current| match current {
                Some(session) if token.matches(&session) => Ok((None, Some(session))),
                other => Ok((other, None)),
            })
    }

    /// Keys among `keys` whose session has expired or no longer exists
    pub fn stale_keys(&self, keys: &[String]) -> Result<Vec<String>> {
        let now = Utc::now().timestamp();
        let mut stale = Vec::new();
        for key in keys {
            let live = self
                .store
                .find::<Session>(key)?
                .map(|session| !session.is_expired(now))
                .unwrap_or(false);
            if !live {
                stale.push(key.clone());
            }
        }
        Ok(stale)
    }

    /// Remove sessions by store key
    pub fn delete_keys(&self, keys: &[String]) -> Result<()> {
        self.store.remove_many::<Session>(keys)
    }
}
