use crate::constants::ERR_INVALID_USERNAME;
use crate::db::EntityStore;
use crate::error::{AppError, Result};
use crate::models::{Chat, Session, User, UserProfile};
use crate::security::{hash_password, verify_password, HashParams};
use crate::services::relations::RelationshipManager;
use crate::services::sandbox::FileSandbox;
use crate::services::sessions::{IssuedSession, SessionManager};
use crate::services::shares::ShareController;

/// Registration, login and the lifecycle of user accounts
#[derive(Clone)]
pub struct Accounts {
    store: EntityStore,
    hash_params: HashParams,
    sessions: SessionManager,
    relations: RelationshipManager,
    sandbox: FileSandbox,
    shares: ShareController,
}

impl Accounts {
    pub fn new(
        store: EntityStore,
        hash_params: HashParams,
        sessions: SessionManager,
        relations: RelationshipManager,
        sandbox: FileSandbox,
        shares: ShareController,
    ) -> Self {
        Self {
            store,
            hash_params,
            sessions,
            relations,
            sandbox,
            shares,
        }
    }

    /// Create a user record and its file root
    pub fn register(&self, name: &str, username: &str, password: &str) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("field 'name' is required"));
        }
        if !User::validate_username(username) {
            return Err(AppError::invalid(ERR_INVALID_USERNAME));
        }
        User::validate_password(password).map_err(AppError::invalid)?;

        let hash = hash_password(password, &self.hash_params)?;
        let user = User::new(name, username, hash);

        if !self.store.insert_new(&user)? {
            tracing::info!("Registration rejected, username {} taken", username);
            return Err(AppError::UserAlreadyExists);
        }

        if let Err(e) = self.sandbox.create_tenant(username) {
            tracing::error!("Failed to create file root for {}: {}", username, e);
            self.store.remove::<User>(username)?;
            return Err(e);
        }

        tracing::info!("New user registered: {}", username);
        Ok(UserProfile::from(&user))
    }

    /// Check credentials and open a session
    ///
    /// Unknown users and wrong passwords fail identically.
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedSession> {
        let Some(user) = self.store.find::<User>(username)? else {
            // Unknown users pay the same Argon2 cost as wrong passwords
            hash_password(password, &self.hash_params)?;
            tracing::warn!("Login failed for unknown user");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password)? {
            tracing::warn!("Login failed for {}", username);
            return Err(AppError::InvalidCredentials);
        }

        let stale = self.sessions.stale_keys(&user.sessions)?;
        self.sessions.delete_keys(&stale)?;

        let issued = self.sessions.create(username)?;
        let key = issued.session.selector.clone();

        let recorded = self.store.modify::<User, _, _>(username, |user| {
            for old in &stale {
                user.remove_session(old);
            }
            Ok(user.add_session(&key))
        })?;
        if recorded.is_none() {
            // Account deleted between the password check and now
            self.sessions.delete_keys(&[key])?;
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!("User logged in: {}", username);
        Ok(issued)
    }

    /// Revoke the session behind `token`; unknown tokens are ignored
    pub fn logout(&self, token: &str) -> Result<()> {
        if let Some(session) = self.sessions.delete(token)? {
            self.store.modify::<User, _, _>(&session.username, |user| {
                Ok(user.remove_session(&session.selector))
            })?;
            tracing::info!("User logged out: {}", session.username);
        }
        Ok(())
    }

    /// Resolve a session token to the current state of its user
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let session = self.sessions.find(token)?;

        match self.store.find::<User>(&session.username)? {
            Some(user) => Ok(user),
            None => {
                self.store.remove::<Session>(&session.selector)?;
                Err(AppError::SessionNotFound)
            }
        }
    }

    pub fn profile(&self, username: &str) -> Result<UserProfile> {
        self.store
            .find::<User>(username)?
            .map(|user| UserProfile::from(&user))
            .ok_or(AppError::UserNotFound)
    }

    /// Change the display name and/or password of `username`
    pub fn update_profile(
        &self,
        username: &str,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<UserProfile> {
        let name = match name.map(str::trim) {
            Some("") => return Err(AppError::invalid("field 'name' cannot be empty")),
            other => other,
        };
        let hash = match password {
            Some(password) => {
                User::validate_password(password).map_err(AppError::invalid)?;
                Some(hash_password(password, &self.hash_params)?)
            }
            None => None,
        };

        let profile = self
            .store
            .modify::<User, _, _>(username, |user| {
                if let Some(name) = name {
                    user.name = name.to_string();
                }
                if let Some(hash) = hash {
                    user.password = hash;
                }
                Ok(UserProfile::from(&*user))
            })?
            .ok_or(AppError::UserNotFound)?;

        tracing::info!("Profile updated for {}", username);
        Ok(profile)
    }

    /// Delete an account together with everything that references it
    ///
    /// Order: sessions, chats, viewer memberships, shares on the user's
    /// own files, the file root, and finally the user record. Each step is
    /// idempotent, so a failed deletion can simply be retried.
    pub fn delete_account(&self, username: &str) -> Result<()> {
        let user = self
            .store
            .find::<User>(username)?
            .ok_or(AppError::UserNotFound)?;

        self.sessions.delete_keys(&user.sessions)?;
        // Sessions whose key never made it onto the user record
        let stray: Vec<String> = self
            .store
            .scan::<Session>("")?
            .into_iter()
            .filter(|session| session.username == username)
            .map(|session| session.selector)
            .collect();
        self.sessions.delete_keys(&stray)?;

        for chat_id in &user.chats {
            if let Some(chat) = self.store.find::<Chat>(chat_id)? {
                self.relations.unlink_chat(&chat)?;
            }
        }

        for path in &user.shares {
            self.relations.unlink_share(path, username)?;
        }

        let root = self.sandbox.resolve(username, "")?;
        self.shares.forget_path(&root)?;
        self.sandbox.remove_tenant(username)?;

        self.store.remove::<User>(username)?;

        tracing::info!("Account deleted: {}", username);
        Ok(())
    }
}
