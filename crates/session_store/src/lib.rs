//! # Session Store
//!
//! Persists one conversation [`Session`](flow_state::Session) per user.
//! Every backend enforces optimistic concurrency: a save only lands when the
//! stored version still matches the one the session was loaded at.
//! [`SessionManager`] layers per-user lanes on top so dispatches for the same
//! user run one at a time.

pub mod error;
pub mod manager;
pub mod sqlite;
pub mod storage;

// Re-exports
pub use error::{Result, SessionError};
pub use manager::{Checkout, Lane, SessionManager};
pub use sqlite::SqliteSessionStorage;
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
