//! Encounter records.
//!
//! A `Contact` is written by the encounter detector when a visibility episode
//! with a nearby device crosses the minimum duration. After that only its
//! `is_synced` flag ever changes, and it is deleted once it ages past the
//! retention horizon.

use crate::{ContactId, EphemeralId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A recorded encounter with a nearby device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique id, assigned at detection time.
    pub id: ContactId,

    /// The local user who recorded the encounter.
    pub user_id: UserId,

    /// The rotating identifier the peer was broadcasting. This is not a
    /// stable identity and cannot be linked to one without the peer's secret.
    pub encountered_user_id: EphemeralId,

    /// When the episode was closed.
    pub timestamp: Timestamp,

    /// Observed length of the episode.
    pub duration_millis: u64,

    /// Last observed signal strength (dBm).
    pub rssi: i32,

    /// Estimated distance in meters, derived from `rssi` alone.
    pub distance_meters: f32,

    /// Whether the remote service has acknowledged this record.
    #[serde(default)]
    pub is_synced: bool,
}

impl Contact {
    /// Creates a new, unsynced contact with a fresh id.
    #[must_use]
    pub fn new(
        user_id: UserId,
        encountered_user_id: EphemeralId,
        timestamp: Timestamp,
        duration_millis: u64,
        rssi: i32,
        distance_meters: f32,
    ) -> Self {
        Self {
            id: ContactId::new(),
            user_id,
            encountered_user_id,
            timestamp,
            duration_millis,
            rssi,
            distance_meters,
            is_synced: false,
        }
    }

    /// Returns the upload representation of this contact.
    #[must_use]
    pub fn to_record(&self) -> ContactRecord {
        ContactRecord::from(self)
    }
}

/// Wire representation of a contact for batch upload.
///
/// The sync flag is local bookkeeping and is never transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: ContactId,
    pub user_id: UserId,
    pub encountered_user_id: EphemeralId,
    /// Epoch milliseconds.
    pub timestamp: u64,
    /// Milliseconds.
    pub duration: u64,
    pub rssi: i32,
    pub distance: f32,
}

impl From<&Contact> for ContactRecord {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            encountered_user_id: c.encountered_user_id.clone(),
            timestamp: c.timestamp.as_millis(),
            duration: c.duration_millis,
            rssi: c.rssi,
            distance: c.distance_meters,
        }
    }
}
