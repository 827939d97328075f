//! Sync engine: upload, mark, purge.
//!
//! A sync pushes every unsynced contact to the remote service as one batch
//! and, only once the remote has accepted it, marks exactly those contacts
//! synced. Nothing is marked on failure, so the next attempt re-sends the
//! same records; uploads are keyed by contact id and overwrite on the
//! remote side.
//!
//! At most one sync runs per user. Each runs as its own task, so it
//! finishes even if every caller stops waiting. A call that arrives while
//! one is in flight waits for it and receives its outcome instead of
//! starting a second upload.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteService;
use contrace_storage::{run_blocking, ContactStore, Preferences};
use contrace_types::{Clock, ContactId, ContactRecord, UserId};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of a successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Records sent in the batch.
    pub uploaded: usize,
    /// Local rows flipped to synced.
    pub marked: usize,
}

type InFlight = Shared<BoxFuture<'static, SyncResult<SyncReport>>>;

struct Inner {
    store: Arc<dyn ContactStore>,
    remote: Arc<dyn RemoteService>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

/// Reconciles the local contact log with the remote service.
///
/// Cheap to clone; clones share the single-flight table.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
    in_flight: Arc<Mutex<HashMap<UserId, InFlight>>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ContactStore>,
        remote: Arc<dyn RemoteService>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                clock,
                config,
            }),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Uploads all unsynced contacts on behalf of `user_id`.
    ///
    /// The upload runs on a spawned task. Dropping the returned future
    /// stops waiting but does not cancel the sync. Must be called within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Storage failures and remote failures are returned unchanged; in
    /// either case no contact has been marked synced by this call.
    pub async fn sync(&self, user_id: UserId) -> SyncResult<SyncReport> {
        let attempt = {
            let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = table.get(&user_id) {
                debug!("joining in-flight sync");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let release = Release {
                    table: Arc::clone(&self.in_flight),
                    user_id,
                };
                let task = tokio::spawn(async move {
                    let _release = release;
                    inner.sync_once(user_id).await
                });
                let attempt = async move {
                    task.await
                        .unwrap_or_else(|e| Err(SyncError::Task(e.to_string())))
                }
                .boxed()
                .shared();
                table.insert(user_id, attempt.clone());
                attempt
            }
        };
        attempt.await
    }

    /// [`sync`](Self::sync) for the user stored in `preferences`.
    ///
    /// # Errors
    ///
    /// [`SyncError::IdentityNotInitialized`] before onboarding; the remote
    /// is not contacted in that case.
    pub async fn sync_current_user(&self, preferences: &Arc<Preferences>) -> SyncResult<SyncReport> {
        let user_id = current_user(preferences).await?;
        self.sync(user_id).await
    }

    /// Deletes contacts older than the retention horizon, synced or not.
    /// Returns how many were removed.
    pub async fn cleanup(&self) -> SyncResult<usize> {
        let cutoff = self
            .inner
            .clock
            .now()
            .days_before(self.inner.config.retention_days);
        let store = Arc::clone(&self.inner.store);
        let removed = run_blocking(move || store.delete_older_than(cutoff)).await?;
        if removed > 0 {
            info!(removed, "purged expired contacts");
        }
        Ok(removed)
    }

    /// Number of contacts recorded within the recent window.
    pub async fn recent_contact_count(&self) -> SyncResult<usize> {
        let cutoff = self
            .inner
            .clock
            .now()
            .saturating_sub(self.inner.config.recent_window());
        let store = Arc::clone(&self.inner.store);
        Ok(run_blocking(move || store.query_count_since(cutoff)).await?)
    }

    /// Asks the remote whether `user_id` has been flagged infected.
    pub async fn check_infection_status(&self, user_id: UserId) -> SyncResult<bool> {
        self.inner
            .bounded(self.inner.remote.get_infection_status(user_id))
            .await
    }
}

/// Frees a user's single-flight slot when its sync task ends, however it ends.
struct Release {
    table: Arc<Mutex<HashMap<UserId, InFlight>>>,
    user_id: UserId,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

impl Inner {
    async fn sync_once(&self, user_id: UserId) -> SyncResult<SyncReport> {
        let store = Arc::clone(&self.store);
        let pending = run_blocking(move || store.query_unsynced()).await?;
        if pending.is_empty() {
            debug!("nothing to sync");
            return Ok(SyncReport::default());
        }

        let records: Vec<ContactRecord> = pending.iter().map(ContactRecord::from).collect();
        let ids: Vec<ContactId> = pending.iter().map(|c| c.id).collect();

        if let Err(e) = self
            .bounded(self.remote.upload_batch(user_id, &records))
            .await
        {
            warn!(count = records.len(), "contact upload failed: {e}");
            return Err(e);
        }

        let store = Arc::clone(&self.store);
        let marked = run_blocking(move || store.mark_synced(&ids)).await?;
        info!(uploaded = records.len(), marked, "contacts synced");
        Ok(SyncReport {
            uploaded: records.len(),
            marked,
        })
    }

    async fn bounded<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.config.request_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        }
    }
}

/// Reads the stable user id, failing fast if onboarding has not happened.
pub(crate) async fn current_user(preferences: &Arc<Preferences>) -> SyncResult<UserId> {
    let preferences = Arc::clone(preferences);
    run_blocking(move || preferences.user_id())
        .await?
        .ok_or(SyncError::IdentityNotInitialized)
}
