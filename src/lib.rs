//! BookPi Server Library
//!
//! A small multi-user workspace: accounts, two-party chats, per-user file
//! trees and per-file sharing. This module exports the core types for the
//! binary and for testing.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

pub use config::Config;
pub use db::{open_database, EntityStore, KvStore};
pub use error::{AppError, Result};
pub use routes::router;

use std::sync::Arc;

use services::{
    Accounts, ChatService, FileSandbox, RelationshipManager, SessionManager, ShareController,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: EntityStore,
    pub sandbox: FileSandbox,
    pub accounts: Accounts,
    pub chats: ChatService,
    pub shares: ShareController,
}

impl AppState {
    /// Wire every service on top of one key-value store and the configured file root
    pub fn new(kv: Arc<dyn KvStore>, config: Config) -> Self {
        let store = EntityStore::new(kv);
        let sandbox = FileSandbox::new(config.files_directory.clone());
        let relations = RelationshipManager::new(store.clone());
        let sessions = SessionManager::new(store.clone());
        let shares = ShareController::new(store.clone(), sandbox.clone(), relations.clone());
        let chats = ChatService::new(store.clone(), relations.clone());
        let accounts = Accounts::new(
            store.clone(),
            config.hash_params,
            sessions,
            relations,
            sandbox.clone(),
            shares.clone(),
        );

        Self {
            config,
            store,
            sandbox,
            accounts,
            chats,
            shares,
        }
    }
}
