//! Durable log of recorded contacts.

use crate::error::{StorageError, StorageResult};
use contrace_types::{Contact, ContactId, EphemeralId, Timestamp, UserId};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// Storage for [`Contact`] records.
///
/// Implementations must be safe to share between the detector task and the
/// sync engine. Every mutating call bumps the counter returned by
/// [`ContactStore::subscribe`].
pub trait ContactStore: Send + Sync {
    /// Inserts a contact, replacing any existing record with the same id.
    fn insert(&self, contact: &Contact) -> StorageResult<()>;

    /// Inserts several contacts in one transaction.
    fn insert_batch(&self, contacts: &[Contact]) -> StorageResult<()>;

    /// Returns every contact not yet acknowledged by the remote service.
    fn query_unsynced(&self) -> StorageResult<Vec<Contact>>;

    /// Returns every contact, newest first.
    fn query_all(&self) -> StorageResult<Vec<Contact>>;

    /// Counts contacts recorded at or after `cutoff`.
    fn query_count_since(&self, cutoff: Timestamp) -> StorageResult<usize>;

    /// Flags the given contacts as synced. Returns how many rows changed.
    fn mark_synced(&self, ids: &[ContactId]) -> StorageResult<usize>;

    /// Deletes contacts recorded strictly before `cutoff`, synced or not.
    /// Returns how many rows were removed.
    fn delete_older_than(&self, cutoff: Timestamp) -> StorageResult<usize>;

    /// Returns contacts with the given peer recorded at or after `cutoff`.
    fn query_by_peer_since(
        &self,
        peer: &EphemeralId,
        cutoff: Timestamp,
    ) -> StorageResult<Vec<Contact>>;

    /// Returns a receiver that changes whenever the log is modified.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

const CONTACT_COLUMNS: &str =
    "id, user_id, encountered_user_id, timestamp, duration_ms, rssi, distance_m, is_synced";

/// [`ContactStore`] backed by a SQLite file.
pub struct SqliteContactStore {
    conn: Mutex<Connection>,
    changes: watch::Sender<u64>,
}

impl SqliteContactStore {
    /// Opens (or creates) a contact store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory contact store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                encountered_user_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                rssi INTEGER NOT NULL,
                distance_m REAL NOT NULL,
                is_synced INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_contacts_synced ON contacts (is_synced);
            CREATE INDEX IF NOT EXISTS idx_contacts_timestamp ON contacts (timestamp);
            CREATE INDEX IF NOT EXISTS idx_contacts_peer
                ON contacts (encountered_user_id, timestamp);
            ",
        )?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<Vec<Contact>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, contact_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl ContactStore for SqliteContactStore {
    fn insert(&self, contact: &Contact) -> StorageResult<()> {
        {
            let conn = self.lock()?;
            insert_contact(&conn, contact)?;
        }
        self.notify();
        Ok(())
    }

    fn insert_batch(&self, contacts: &[Contact]) -> StorageResult<()> {
        if contacts.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            for contact in contacts {
                insert_contact(&tx, contact)?;
            }
            tx.commit()?;
        }
        self.notify();
        Ok(())
    }

    fn query_unsynced(&self) -> StorageResult<Vec<Contact>> {
        self.query(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE is_synced = 0 ORDER BY timestamp"),
            [],
        )
    }

    fn query_all(&self) -> StorageResult<Vec<Contact>> {
        self.query(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY timestamp DESC, id DESC"),
            [],
        )
    }

    fn query_count_since(&self, cutoff: Timestamp) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE timestamp >= ?1",
            params![millis_to_sql(cutoff)],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn mark_synced(&self, ids: &[ContactId]) -> StorageResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let changed = {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            let mut changed = 0;
            {
                let mut stmt = tx.prepare("UPDATE contacts SET is_synced = 1 WHERE id = ?1")?;
                for id in ids {
                    changed += stmt.execute(params![id.to_string()])?;
                }
            }
            tx.commit()?;
            changed
        };
        debug!(changed, requested = ids.len(), "marked contacts synced");
        self.notify();
        Ok(changed)
    }

    fn delete_older_than(&self, cutoff: Timestamp) -> StorageResult<usize> {
        let removed = {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM contacts WHERE timestamp < ?1",
                params![millis_to_sql(cutoff)],
            )?
        };
        if removed > 0 {
            debug!(removed, %cutoff, "purged expired contacts");
            self.notify();
        }
        Ok(removed)
    }

    fn query_by_peer_since(
        &self,
        peer: &EphemeralId,
        cutoff: Timestamp,
    ) -> StorageResult<Vec<Contact>> {
        self.query(
            &format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts \
                 WHERE encountered_user_id = ?1 AND timestamp >= ?2 ORDER BY timestamp"
            ),
            params![peer.as_str(), millis_to_sql(cutoff)],
        )
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

fn insert_contact(conn: &Connection, contact: &Contact) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO contacts \
         (id, user_id, encountered_user_id, timestamp, duration_ms, rssi, distance_m, is_synced) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            contact.id.to_string(),
            contact.user_id.to_string(),
            contact.encountered_user_id.as_str(),
            millis_to_sql(contact.timestamp),
            i64::try_from(contact.duration_millis).unwrap_or(i64::MAX),
            contact.rssi,
            f64::from(contact.distance_meters),
            contact.is_synced,
        ],
    )
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let peer: String = row.get(2)?;
    let timestamp: i64 = row.get(3)?;
    let duration: i64 = row.get(4)?;
    let distance: f64 = row.get(6)?;

    Ok(Contact {
        id: ContactId::parse(&id).map_err(|e| conversion_error(0, e))?,
        user_id: UserId::parse(&user_id).map_err(|e| conversion_error(1, e))?,
        encountered_user_id: EphemeralId::parse(&peer).map_err(|e| conversion_error(2, e))?,
        timestamp: Timestamp::from_millis(u64::try_from(timestamp).unwrap_or(0)),
        duration_millis: u64::try_from(duration).unwrap_or(0),
        rssi: row.get(5)?,
        distance_meters: distance as f32,
        is_synced: row.get(7)?,
    })
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn millis_to_sql(t: Timestamp) -> i64 {
    i64::try_from(t.as_millis()).unwrap_or(i64::MAX)
}
