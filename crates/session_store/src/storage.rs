//! Session storage trait and implementations

use crate::error::{Result, SessionError};
use async_trait::async_trait;
use band_core::UserId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flow_state::Session;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Session storage trait
///
/// `save` replaces the whole document. It succeeds only when the stored
/// version equals `session.version` (a missing document counts as version 0)
/// and returns the new version; otherwise it fails with
/// [`SessionError::Conflict`] and leaves the stored document untouched.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Load a session. `Ok(None)` when the user has none yet.
    async fn load(&self, user_id: UserId) -> Result<Option<Session>>;

    /// Save a session, returning the version it was stored at.
    async fn save(&self, session: &Session) -> Result<u64>;
}

fn check_version(session: &Session, found: u64) -> Result<u64> {
    if session.version != found {
        return Err(SessionError::Conflict {
            user_id: session.user_id,
            expected: session.version,
            found,
        });
    }
    Ok(found + 1)
}

/// In-process storage, mainly for tests and single-node setups.
#[derive(Default)]
pub struct MemorySessionStorage {
    sessions: DashMap<UserId, Session>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<Session>> {
        Ok(self.sessions.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, session: &Session) -> Result<u64> {
        let mut stored = session.clone();
        match self.sessions.entry(session.user_id) {
            Entry::Occupied(mut entry) => {
                stored.version = check_version(session, entry.get().version)?;
                let version = stored.version;
                entry.insert(stored);
                Ok(version)
            }
            Entry::Vacant(entry) => {
                stored.version = check_version(session, 0)?;
                let version = stored.version;
                entry.insert(stored);
                Ok(version)
            }
        }
    }
}

/// File-based session storage: one JSON document per user.
pub struct FileSessionStorage {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, user_id: UserId) -> PathBuf {
        self.base_path.join(format!("{}.json", user_id))
    }

    fn temp_path(&self, user_id: UserId) -> PathBuf {
        self.base_path.join(format!(".{}.json.tmp", user_id))
    }

    async fn stored_version(&self, user_id: UserId) -> Result<u64> {
        Ok(self.load(user_id).await?.map_or(0, |stored| stored.version))
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<Session>> {
        let contents = match fs::read_to_string(self.session_path(user_id)).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let session: Session = serde_json::from_str(&contents)?;
        if session.user_id != user_id {
            return Err(SessionError::InvalidData(format!(
                "document for user {} belongs to user {}",
                user_id, session.user_id
            )));
        }
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let found = self.stored_version(session.user_id).await?;
        let mut stored = session.clone();
        stored.version = check_version(session, found)?;

        fs::create_dir_all(&self.base_path).await?;
        let temp_path = self.temp_path(session.user_id);
        let contents = serde_json::to_string_pretty(&stored)?;
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, self.session_path(session.user_id)).await?;

        Ok(stored.version)
    }
}
