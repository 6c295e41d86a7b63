//! Session store error types

use band_core::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session of user {user_id} changed concurrently (expected version {expected}, found {found})")]
    Conflict {
        user_id: UserId,
        expected: u64,
        found: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task join error: {0}")]
    Task(String),

    #[error("Invalid session data: {0}")]
    InvalidData(String),
}

impl SessionError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SessionError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
