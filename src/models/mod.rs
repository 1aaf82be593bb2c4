pub mod chat;
pub mod file;
pub mod session;
pub mod share;
pub mod user;

pub use chat::{Chat, ChatSummary, Message};
pub use file::{FileInfo, Listing};
pub use session::Session;
pub use share::Share;
pub use user::{User, UserProfile};
