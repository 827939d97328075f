//! Identity layer for contrace.
//!
//! # Identities
//!
//! Each install owns two stable identifiers, a [`UserId`] and a
//! [`DeviceId`], both random 128-bit values created once on first run.
//! Neither is ever broadcast.
//!
//! # Ephemeral ids
//!
//! What nearby devices actually see is an [`EphemeralId`]: the first 16 hex
//! characters of `SHA-256("{user_id}-{epoch_millis}")`. The same
//! `(user_id, epoch)` pair always yields the same id, so advertisements
//! within one rotation epoch are stable, while ids from different epochs
//! cannot be linked to each other or to the user without the preimage.
//!
//! [`IdentityCell`] holds the current identity together with the id for the
//! active epoch and swaps both in a single step on rotation.

mod identity;

pub use identity::{
    derive_ephemeral_id, new_stable_id, Identity, IdentityCell, IdentitySnapshot,
};

pub use contrace_types::{DeviceId, EphemeralId, UserId};
