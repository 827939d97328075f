//! Error types for the radio layer.

use thiserror::Error;

/// Result type for radio operations.
pub type RadioResult<T> = Result<T, RadioError>;

/// Errors from the radio layer and tracing sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    /// The device has no usable scan/advertise capability.
    #[error("radio unavailable")]
    Unavailable,

    /// Starting or stopping a scan failed.
    #[error("scan error: {0}")]
    Scan(String),

    /// Starting or stopping an advertisement failed.
    #[error("advertise error: {0}")]
    Advertise(String),

    /// Session state could not be persisted.
    #[error("storage error: {0}")]
    Storage(String),
}
