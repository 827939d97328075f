//! Remote sync for contrace.
//!
//! Moves locally recorded contacts to the remote service and keeps the
//! account-level state (registration, push token, infection flag) current.
//!
//! # Components
//!
//! - **Engine**: single-flight upload of unsynced contacts, retention purge
//! - **Remote**: the [`RemoteService`] trait and its HTTP client
//! - **Worker**: periodic sync/cleanup/status refresh with backoff
//! - **Account**: first-run onboarding and push token refresh
//! - **Push**: decoding and applying push messages
//!
//! # Example
//!
//! ```no_run
//! use contrace_storage::{Preferences, SqliteContactStore};
//! use contrace_sync::{HttpRemoteConfig, HttpRemoteService, SyncConfig, SyncEngine, SyncWorker};
//! use contrace_types::SystemClock;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteContactStore::open("contacts.db")?);
//! let preferences = Arc::new(Preferences::open("prefs.db")?);
//! let remote = Arc::new(HttpRemoteService::new(HttpRemoteConfig::default())?);
//! let engine = SyncEngine::new(store, remote, Arc::new(SystemClock), SyncConfig::default());
//!
//! let worker = SyncWorker::new(engine, preferences);
//! let outcome = worker.run_once().await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

mod account;
mod config;
mod engine;
mod error;
mod http;
pub mod push;
pub mod remote;
mod worker;

pub use account::{Account, Onboarding};
pub use config::{BackoffPolicy, SyncConfig};
pub use engine::{SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use http::{HttpRemoteConfig, HttpRemoteService};
pub use push::{PushHandler, PushMessage};
pub use remote::RemoteService;
pub use worker::{SyncWorker, WorkOutcome};
