//! Session Manager - per-user lanes over a session storage

use crate::error::{Result, SessionError};
use crate::storage::SessionStorage;
use band_core::UserId;
use dashmap::DashMap;
use flow_state::Session;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Lanes = DashMap<UserId, Arc<Mutex<()>>>;

/// Exclusive hold on one user's session for the length of a dispatch.
///
/// Dropping the lane releases the user; the lane entry itself is removed
/// once no other dispatch for that user is waiting on it.
pub struct Lane {
    user_id: UserId,
    lanes: Arc<Lanes>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Lane {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        // Map + this guard are the only holders when nobody is queued.
        self.lanes
            .remove_if(&self.user_id, |_, lane| Arc::strong_count(lane) <= 2);
        self.guard.take();
    }
}

/// A session checked out under its user's lane.
pub struct Checkout {
    pub session: Session,
    /// Whether the session came from the store rather than being created.
    pub found: bool,
    pub lane: Lane,
}

/// Session Manager - serializes dispatches per user
pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    lanes: Arc<Lanes>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            lanes: Arc::new(DashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Wait for the user's lane, then load their session or start a fresh one.
    pub async fn checkout(&self, user_id: UserId) -> Result<Checkout> {
        let lane = self.acquire(user_id).await;

        let (session, found) = match self.storage.load(user_id).await? {
            Some(session) => (session, true),
            None => (Session::new(user_id), false),
        };

        tracing::debug!(
            user_id = %user_id,
            found,
            version = session.version,
            "session checked out"
        );
        Ok(Checkout {
            session,
            found,
            lane,
        })
    }

    /// Save a session while its lane is held. Updates `session.version`.
    pub async fn commit(&self, lane: &Lane, session: &mut Session) -> Result<u64> {
        if lane.user_id != session.user_id {
            return Err(SessionError::InvalidData(format!(
                "lane of user {} cannot commit session of user {}",
                lane.user_id, session.user_id
            )));
        }

        session.touch();
        let version = self.storage.save(session).await?;
        session.version = version;
        Ok(version)
    }

    /// Read-only peek that does not wait for the lane.
    pub async fn peek(&self, user_id: UserId) -> Result<Option<Session>> {
        self.storage.load(user_id).await
    }

    /// Users with a dispatch running or queued.
    pub fn active_lanes(&self) -> usize {
        self.lanes.len()
    }

    async fn acquire(&self, user_id: UserId) -> Lane {
        let mutex = self
            .lanes
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        Lane {
            user_id,
            lanes: self.lanes.clone(),
            guard: Some(guard),
        }
    }
}
