//! Durable key-value preferences.
//!
//! Holds the stable identity, the last rotation time, the push token and the
//! infection flag. Every write is visible to the next read in this process.

use crate::error::{StorageError, StorageResult};
use contrace_crypto::Identity;
use contrace_types::{DeviceId, Timestamp, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const KEY_USER_ID: &str = "user_id";
const KEY_DEVICE_ID: &str = "device_id";
const KEY_LAST_ID_ROTATION: &str = "last_id_rotation";
const KEY_PUSH_TOKEN: &str = "push_token";
const KEY_IS_INFECTED: &str = "is_infected";

/// Preference store backed by SQLite.
pub struct Preferences {
    conn: Mutex<Connection>,
}

impl Preferences {
    /// Opens (or creates) a preference store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory preference store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        get_value(&conn, key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        set_value(&conn, key, value)?;
        Ok(())
    }

    // ── Identity ─────────────────────────────────────────────────

    /// Returns the stable user id, if one has been created.
    pub fn user_id(&self) -> StorageResult<Option<UserId>> {
        self.get(KEY_USER_ID)?
            .map(|s| UserId::parse(&s).map_err(|e| invalid(KEY_USER_ID, e)))
            .transpose()
    }

    /// Returns the stable device id, if one has been created.
    pub fn device_id(&self) -> StorageResult<Option<DeviceId>> {
        self.get(KEY_DEVICE_ID)?
            .map(|s| DeviceId::parse(&s).map_err(|e| invalid(KEY_DEVICE_ID, e)))
            .transpose()
    }

    /// Returns the stored identity if both halves exist.
    pub fn identity(&self) -> StorageResult<Option<Identity>> {
        Ok(match (self.user_id()?, self.device_id()?) {
            (Some(user_id), Some(device_id)) => Some(Identity { user_id, device_id }),
            _ => None,
        })
    }

    /// Loads the stored identity, creating and persisting one on first run.
    ///
    /// Returns the identity and whether it was just created. An existing user
    /// id is never replaced; a missing device id is filled in on its own.
    pub fn load_or_create_identity(&self) -> StorageResult<(Identity, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let user_id = get_value(&tx, KEY_USER_ID)?
            .map(|s| UserId::parse(&s).map_err(|e| invalid(KEY_USER_ID, e)))
            .transpose()?;
        let device_id = get_value(&tx, KEY_DEVICE_ID)?
            .map(|s| DeviceId::parse(&s).map_err(|e| invalid(KEY_DEVICE_ID, e)))
            .transpose()?;

        if let (Some(user_id), Some(device_id)) = (user_id, device_id) {
            return Ok((Identity { user_id, device_id }, false));
        }

        let fresh = Identity::generate();
        let identity = Identity {
            user_id: user_id.unwrap_or(fresh.user_id),
            device_id: device_id.unwrap_or(fresh.device_id),
        };
        set_value(&tx, KEY_USER_ID, &identity.user_id.to_string())?;
        set_value(&tx, KEY_DEVICE_ID, &identity.device_id.to_string())?;
        tx.commit()?;

        info!(created_user = user_id.is_none(), "created stable identity");
        Ok((identity, user_id.is_none()))
    }

    // ── Rotation ─────────────────────────────────────────────────

    /// Returns the start of the last rotation epoch, or the epoch if none.
    pub fn last_rotation(&self) -> StorageResult<Timestamp> {
        match self.get(KEY_LAST_ID_ROTATION)? {
            Some(s) => s
                .parse::<u64>()
                .map(Timestamp::from_millis)
                .map_err(|e| invalid(KEY_LAST_ID_ROTATION, e)),
            None => Ok(Timestamp::EPOCH),
        }
    }

    /// Records the start of a new rotation epoch.
    pub fn set_last_rotation(&self, at: Timestamp) -> StorageResult<()> {
        self.set(KEY_LAST_ID_ROTATION, &at.as_millis().to_string())
    }

    // ── Push token ───────────────────────────────────────────────

    /// Returns the current push token.
    pub fn push_token(&self) -> StorageResult<Option<String>> {
        self.get(KEY_PUSH_TOKEN)
    }

    /// Stores a new push token.
    pub fn set_push_token(&self, token: &str) -> StorageResult<()> {
        self.set(KEY_PUSH_TOKEN, token)
    }

    // ── Infection flag ───────────────────────────────────────────

    /// Returns whether this user has been flagged as infected.
    pub fn is_infected(&self) -> StorageResult<bool> {
        Ok(self.get(KEY_IS_INFECTED)?.as_deref() == Some("true"))
    }

    /// Updates the infection flag.
    pub fn set_infected(&self, infected: bool) -> StorageResult<()> {
        self.set(KEY_IS_INFECTED, if infected { "true" } else { "false" })
    }
}

fn get_value(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM preferences WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn set_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
}

fn invalid(key: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::InvalidData(format!("{key}: {err}"))
}
