//! Core type definitions for contrace.
//!
//! This crate defines the plain data types shared by every layer of the
//! tracing engine:
//! - Stable identifiers (`UserId`, `DeviceId`) and per-encounter `ContactId`s
//! - Rotating broadcast identifiers (`EphemeralId`)
//! - Millisecond `Timestamp`s and the `Clock` abstraction
//! - The `Contact` encounter record and its `ContactRecord` wire form
//! - Request/response bodies of the remote service API (`api`)
//!
//! Nothing in here performs I/O.

pub mod api;
mod clock;
mod contact;
mod ids;
mod timestamp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contact::{Contact, ContactRecord};
pub use ids::{ContactId, DeviceId, EphemeralId, UserId, EPHEMERAL_ID_LEN};
pub use timestamp::{Timestamp, MILLIS_PER_DAY};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid ephemeral id: {0:?}")]
    InvalidEphemeralId(String),
}
