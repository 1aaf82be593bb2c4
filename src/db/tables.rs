use redb::TableDefinition;

use super::Bucket;

/// Users table: username -> User (JSON)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Sessions table: session selector (hex) -> Session (JSON)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Chats table: chat id (UUID string) -> Chat (JSON)
pub const CHATS: TableDefinition<&str, &[u8]> = TableDefinition::new("chats");

/// Shares table: owner-prefixed file path -> Share (JSON)
/// Keys sort by owner, so a prefix scan finds every share under a directory
pub const SHARES: TableDefinition<&str, &[u8]> = TableDefinition::new("shares");

/// Table backing a bucket
pub fn definition(bucket: Bucket) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match bucket {
        Bucket::Users => USERS,
        Bucket::Sessions => SESSIONS,
        Bucket::Chats => CHATS,
        Bucket::Shares => SHARES,
    }
}
