//! Stable identity generation and ephemeral id rotation.

use contrace_types::{DeviceId, EphemeralId, Timestamp, UserId, EPHEMERAL_ID_LEN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Generates a fresh stable identifier.
///
/// Random (UUID v4), so 122 bits of entropy from the OS generator.
#[must_use]
pub fn new_stable_id() -> Uuid {
    Uuid::new_v4()
}

/// Derives the broadcast id for `user_id` during the epoch starting at `epoch`.
///
/// Deterministic for a given pair; truncated to [`EPHEMERAL_ID_LEN`] hex chars
/// to fit the advertisement payload.
#[must_use]
pub fn derive_ephemeral_id(user_id: &UserId, epoch: Timestamp) -> EphemeralId {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", user_id, epoch.as_millis()).as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; EPHEMERAL_ID_LEN / 2];
    prefix.copy_from_slice(&digest[..EPHEMERAL_ID_LEN / 2]);
    EphemeralId::from_bytes(prefix)
}

/// The long-lived identity of this install.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub device_id: DeviceId,
}

impl Identity {
    /// Generates a brand-new identity. Call once, on first run.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            user_id: UserId::from_uuid(new_stable_id()),
            device_id: DeviceId::from_uuid(new_stable_id()),
        }
    }

    /// Derives this identity's ephemeral id for `epoch`.
    #[must_use]
    pub fn ephemeral_id(&self, epoch: Timestamp) -> EphemeralId {
        derive_ephemeral_id(&self.user_id, epoch)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &"[REDACTED]")
            .field("device_id", &"[REDACTED]")
            .finish()
    }
}

/// An identity plus the ephemeral id of its current rotation epoch.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub identity: Identity,
    pub ephemeral_id: EphemeralId,
    pub rotated_at: Timestamp,
}

impl IdentitySnapshot {
    fn at(identity: Identity, rotated_at: Timestamp) -> Self {
        Self {
            identity,
            ephemeral_id: identity.ephemeral_id(rotated_at),
            rotated_at,
        }
    }

    /// Shorthand for `self.identity.user_id`.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }
}

impl fmt::Debug for IdentitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySnapshot")
            .field("identity", &self.identity)
            .field("ephemeral_id", &self.ephemeral_id)
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}

/// Shared holder of the current [`IdentitySnapshot`].
///
/// Readers get an `Arc` to an immutable snapshot, so the id and its
/// rotation time are always read together.
#[derive(Debug)]
pub struct IdentityCell {
    current: RwLock<Arc<IdentitySnapshot>>,
}

impl IdentityCell {
    /// Creates a cell whose first epoch starts at `rotated_at`.
    #[must_use]
    pub fn new(identity: Identity, rotated_at: Timestamp) -> Self {
        Self {
            current: RwLock::new(Arc::new(IdentitySnapshot::at(identity, rotated_at))),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IdentitySnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Starts a new epoch at `at` and returns its snapshot.
    pub fn rotate(&self, at: Timestamp) -> Arc<IdentitySnapshot> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(IdentitySnapshot::at(guard.identity, at));
        *guard = Arc::clone(&next);
        next
    }
}
