//! SQLite session storage

use crate::error::{Result, SessionError};
use crate::storage::SessionStorage;
use async_trait::async_trait;
use band_core::UserId;
use flow_state::Session;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sessions in a single SQLite table, one row per user.
///
/// The version check happens inside the `UPDATE`/`INSERT` statement itself,
/// so several processes may share one database file.
#[derive(Debug, Clone)]
pub struct SqliteSessionStorage {
    db_path: PathBuf,
}

impl SqliteSessionStorage {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.with_connection(|connection| {
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    user_id INTEGER PRIMARY KEY,
                    version INTEGER NOT NULL,
                    updated_at TEXT NOT NULL,
                    document TEXT NOT NULL
                );
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(&self, func: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let connection = open_connection(&db_path)?;
            func(&connection)
        })
        .await
        .map_err(|error| SessionError::Task(error.to_string()))?
    }
}

#[async_trait]
impl SessionStorage for SqliteSessionStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<Session>> {
        self.with_connection(move |connection| {
            let row = connection
                .query_row(
                    "SELECT version, document FROM sessions WHERE user_id = ?1",
                    params![user_id.0],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            let Some((version, document)) = row else {
                return Ok(None);
            };
            let mut session: Session = serde_json::from_str(&document)?;
            session.user_id = user_id;
            session.version = to_version(version)?;
            Ok(Some(session))
        })
        .await
    }

    async fn save(&self, session: &Session) -> Result<u64> {
        let mut stored = session.clone();
        stored.version = session.version + 1;
        let document = serde_json::to_string(&stored)?;
        let expected = session.version;
        let user_id = session.user_id;
        let updated_at = stored.updated_at.to_rfc3339();

        self.with_connection(move |connection| {
            let new_version = from_version(expected + 1)?;
            let changed = if expected == 0 {
                connection.execute(
                    "INSERT INTO sessions (user_id, version, updated_at, document)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id) DO NOTHING",
                    params![user_id.0, new_version, updated_at, document],
                )?
            } else {
                connection.execute(
                    "UPDATE sessions SET version = ?2, updated_at = ?3, document = ?4
                     WHERE user_id = ?1 AND version = ?5",
                    params![
                        user_id.0,
                        new_version,
                        updated_at,
                        document,
                        from_version(expected)?
                    ],
                )?
            };

            if changed == 0 {
                let found = connection
                    .query_row(
                        "SELECT version FROM sessions WHERE user_id = ?1",
                        params![user_id.0],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?
                    .map(to_version)
                    .transpose()?
                    .unwrap_or(0);
                return Err(SessionError::Conflict {
                    user_id,
                    expected,
                    found,
                });
            }
            Ok(expected + 1)
        })
        .await
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let connection = Connection::open(path)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    connection.busy_timeout(Duration::from_secs(5))?;
    Ok(connection)
}

fn to_version(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| SessionError::InvalidData(format!("negative version {raw}")))
}

fn from_version(version: u64) -> Result<i64> {
    i64::try_from(version)
        .map_err(|_| SessionError::InvalidData(format!("version {version} out of range")))
}
