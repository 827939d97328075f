//! Identifier types used throughout the contrace core.
//!
//! Stable identities (`UserId`, `DeviceId`) wrap random UUIDs and are created
//! once per install. Contact ids use UUID v7 so they sort by creation time.
//! `EphemeralId` is the short token actually broadcast over the radio.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of an ephemeral id in hex characters.
pub const EPHEMERAL_ID_LEN: usize = 16;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates an id from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an id from a string.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Long-lived identifier of the person using this device.
    ///
    /// Never broadcast; only the remote service sees it.
    UserId
);

uuid_id!(
    /// Long-lived identifier of this install, kept apart from `UserId`.
    DeviceId
);

uuid_id!(
    /// Unique identifier of a recorded contact.
    ContactId
);

impl ContactId {
    /// Creates a new, time-ordered contact id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

/// Short rotating identifier broadcast by a device during one rotation epoch.
///
/// Always exactly [`EPHEMERAL_ID_LEN`] lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EphemeralId(String);

impl EphemeralId {
    /// Parses and validates an ephemeral id.
    ///
    /// Uppercase hex is accepted and normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.len() != EPHEMERAL_ID_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidEphemeralId(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Builds an ephemeral id by hex-encoding `bytes`.
    ///
    /// Total: any byte array of this size encodes to a valid id.
    #[must_use]
    pub fn from_bytes(bytes: [u8; EPHEMERAL_ID_LEN / 2]) -> Self {
        let mut s = String::with_capacity(EPHEMERAL_ID_LEN);
        for b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        Self(s)
    }

    /// Decodes an ephemeral id from a raw advertisement payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, Error> {
        let s = std::str::from_utf8(payload)
            .map_err(|_| Error::InvalidEphemeralId(format!("{payload:02x?}")))?;
        Self::parse(s)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the bytes placed in the advertisement payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Display for EphemeralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EphemeralId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EphemeralId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EphemeralId> for String {
    fn from(id: EphemeralId) -> Self {
        id.0
    }
}
