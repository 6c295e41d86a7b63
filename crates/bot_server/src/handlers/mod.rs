pub mod chats;
pub mod health;
pub mod sessions;
pub mod updates;
