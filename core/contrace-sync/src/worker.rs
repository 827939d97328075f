//! Periodic background sync.

use crate::config::BackoffPolicy;
use crate::engine::{current_user, SyncEngine};
use crate::error::SyncError;
use contrace_storage::{run_blocking, Preferences};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of one background run, in the terms host job schedulers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Done; run again at the next regular period.
    Success,
    /// Transient failure; run again after a backoff.
    Retry,
    /// Cannot make progress until something else changes (no identity).
    Failure,
}

/// Drives sync, cleanup and the infection-status refresh.
pub struct SyncWorker {
    engine: SyncEngine,
    preferences: Arc<Preferences>,
    interval: Duration,
    backoff: BackoffPolicy,
}

impl SyncWorker {
    pub fn new(engine: SyncEngine, preferences: Arc<Preferences>) -> Self {
        let interval = engine.config().sync_interval();
        let backoff = engine.config().backoff;
        Self {
            engine,
            preferences,
            interval,
            backoff,
        }
    }

    /// One background run.
    ///
    /// Sync first. Only if it succeeds, purge expired contacts and then
    /// refresh the infection flag. A failed status query is logged and
    /// does not affect the outcome.
    pub async fn run_once(&self) -> WorkOutcome {
        let user_id = match current_user(&self.preferences).await {
            Ok(user_id) => user_id,
            Err(SyncError::IdentityNotInitialized) => {
                debug!("no identity yet, skipping sync");
                return WorkOutcome::Failure;
            }
            Err(e) => {
                warn!("failed to read identity: {e}");
                return WorkOutcome::Retry;
            }
        };

        if let Err(e) = self.engine.sync(user_id).await {
            warn!(retryable = e.is_retryable(), "background sync failed: {e}");
            return WorkOutcome::Retry;
        }

        if let Err(e) = self.engine.cleanup().await {
            warn!("retention cleanup failed: {e}");
            return WorkOutcome::Retry;
        }

        match self.engine.check_infection_status(user_id).await {
            Ok(infected) => {
                let preferences = Arc::clone(&self.preferences);
                if let Err(e) = run_blocking(move || preferences.set_infected(infected)).await {
                    warn!("failed to store infection status: {e}");
                }
            }
            Err(e) => warn!("infection status query failed: {e}"),
        }

        WorkOutcome::Success
    }

    /// Runs [`run_once`](Self::run_once) until `shutdown` is raised.
    ///
    /// Waits the regular interval after `Success` and `Failure`, and the
    /// backoff delay after consecutive `Retry`s.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut failures = 0u32;
        loop {
            let outcome = tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                outcome = self.run_once() => outcome,
            };

            let delay = match outcome {
                WorkOutcome::Retry => {
                    failures = failures.saturating_add(1);
                    self.backoff.delay(failures)
                }
                WorkOutcome::Success | WorkOutcome::Failure => {
                    failures = 0;
                    self.interval
                }
            };
            debug!(?outcome, delay_ms = delay.as_millis() as u64, "next sync scheduled");

            tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        info!("sync worker stopped");
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
