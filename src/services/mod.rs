pub mod accounts;
pub mod chats;
pub mod relations;
pub mod sandbox;
pub mod sessions;
pub mod shares;

pub use accounts::Accounts;
pub use chats::ChatService;
pub use relations::RelationshipManager;
pub use sandbox::{FileSandbox, Relocation, TenantPath};
pub use sessions::SessionManager;
pub use shares::ShareController;
