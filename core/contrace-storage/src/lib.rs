//! SQLite storage layer for contrace.
//!
//! Provides the two durable stores the tracing engine relies on:
//!
//! - [`ContactStore`]: the local encounter log, keyed by contact id and
//!   queryable by sync flag, time range and observed peer. The trait lets the
//!   detector and sync engine run against any backend; [`SqliteContactStore`]
//!   is the shipped one.
//! - [`Preferences`]: a small key-value table holding the stable identity,
//!   the last rotation time, the push token and the infection flag.
//!
//! Both are synchronous. Async callers move work onto the blocking pool with
//! `tokio::task::spawn_blocking`, see [`run_blocking`].

mod contact_store;
mod error;
mod feed;
mod preferences;

pub use contact_store::{ContactStore, SqliteContactStore};
pub use error::{StorageError, StorageResult};
pub use feed::watch_all;
pub use preferences::Preferences;

/// Runs a blocking storage call on tokio's blocking pool.
pub async fn run_blocking<T, F>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(StorageError::Task(e.to_string())),
    }
}
