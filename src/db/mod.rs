pub mod entity;
pub mod memory;
pub mod redb_store;
pub mod tables;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub use entity::{Entity, EntityStore};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// Independent keyspace holding one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Users,
    Sessions,
    Chats,
    Shares,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Users, Bucket::Sessions, Bucket::Chats, Bucket::Shares];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Users => "users",
            Bucket::Sessions => "sessions",
            Bucket::Chats => "chats",
            Bucket::Shares => "shares",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of an atomic read-modify-write
#[derive(Debug)]
pub enum WriteOp {
    Put(Vec<u8>),
    Delete,
    Keep,
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Update was not applied")]
    NotApplied,
}

/// Key-value persistence with one partition per entity kind
///
/// Every method is a single atomic unit. There is no transaction spanning
/// several calls: callers that touch more than one key apply their writes
/// in sequence.
pub trait KvStore: Send + Sync {
    fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Removing an absent key is not an error
    fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError>;

    /// Remove several keys of one bucket in a single write
    fn delete_many(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError>;

    /// Read the current value and replace it with the closure's decision,
    /// with no other writer able to interleave
    fn update(
        &self,
        bucket: Bucket,
        key: &str,
        f: &mut dyn FnMut(Option<&[u8]>) -> WriteOp,
    ) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, bucket: Bucket, prefix: &str)
        -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Cheap liveness probe
    fn ping(&self) -> Result<(), StoreError>;
}

/// Open or create the redb database at the given path
///
/// Creates all buckets on first run.
pub fn open_database(path: impl AsRef<Path>) -> Result<Arc<dyn KvStore>, StoreError> {
    Ok(Arc::new(RedbStore::open(path)?))
}
