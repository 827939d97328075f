//! Remote service abstraction.

use crate::error::SyncResult;
use async_trait::async_trait;
use contrace_types::{ContactRecord, UserId};

/// The server side of contact sync.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Stores a batch of contact records for `user_id`.
    ///
    /// All-or-nothing: on error none of the records may be considered stored.
    async fn upload_batch(&self, user_id: UserId, records: &[ContactRecord]) -> SyncResult<()>;

    /// Registers a new user with its push token.
    async fn register_user(&self, user_id: UserId, push_token: &str) -> SyncResult<()>;

    /// Replaces the push token of a registered user.
    async fn update_token(&self, user_id: UserId, push_token: &str) -> SyncResult<()>;

    /// Whether the user has been flagged as infected.
    async fn get_infection_status(&self, user_id: UserId) -> SyncResult<bool>;
}

/// An in-memory remote for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records calls and stored data; failures and latency are injectable.
    #[derive(Debug, Default)]
    pub struct MockRemote {
        uploads: Mutex<Vec<(UserId, Vec<ContactRecord>)>>,
        tokens: Mutex<HashMap<UserId, String>>,
        infected: Mutex<HashSet<UserId>>,
        upload_failure: Mutex<Option<SyncError>>,
        register_failure: Mutex<Option<SyncError>>,
        token_failure: Mutex<Option<SyncError>>,
        status_failure: Mutex<Option<SyncError>>,
        latency: Mutex<Duration>,
        upload_calls: AtomicUsize,
        status_calls: AtomicUsize,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every upload fails with `err` until cleared.
        pub fn fail_uploads(&self, err: Option<SyncError>) {
            *self.upload_failure.lock().unwrap() = err;
        }

        pub fn fail_registration(&self, err: Option<SyncError>) {
            *self.register_failure.lock().unwrap() = err;
        }

        pub fn fail_token_updates(&self, err: Option<SyncError>) {
            *self.token_failure.lock().unwrap() = err;
        }

        pub fn fail_status_queries(&self, err: Option<SyncError>) {
            *self.status_failure.lock().unwrap() = err;
        }

        /// Every call sleeps this long before answering.
        pub fn set_latency(&self, latency: Duration) {
            *self.latency.lock().unwrap() = latency;
        }

        pub fn set_infected(&self, user_id: UserId, infected: bool) {
            let mut set = self.infected.lock().unwrap();
            if infected {
                set.insert(user_id);
            } else {
                set.remove(&user_id);
            }
        }

        /// Successfully stored batches, in order.
        pub fn uploads(&self) -> Vec<(UserId, Vec<ContactRecord>)> {
            self.uploads.lock().unwrap().clone()
        }

        /// Upload attempts, including failed ones.
        pub fn upload_calls(&self) -> usize {
            self.upload_calls.load(Ordering::SeqCst)
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        pub fn token_of(&self, user_id: UserId) -> Option<String> {
            self.tokens.lock().unwrap().get(&user_id).cloned()
        }

        async fn delay(&self) {
            let latency = *self.latency.lock().unwrap();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }

        fn injected(slot: &Mutex<Option<SyncError>>) -> SyncResult<()> {
            match slot.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RemoteService for MockRemote {
        async fn upload_batch(&self, user_id: UserId, records: &[ContactRecord]) -> SyncResult<()> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            self.delay().await;
            Self::injected(&self.upload_failure)?;
            self.uploads
                .lock()
                .unwrap()
                .push((user_id, records.to_vec()));
            Ok(())
        }

        async fn register_user(&self, user_id: UserId, push_token: &str) -> SyncResult<()> {
            self.delay().await;
            Self::injected(&self.register_failure)?;
            self.tokens
                .lock()
                .unwrap()
                .insert(user_id, push_token.to_string());
            self.infected.lock().unwrap().remove(&user_id);
            Ok(())
        }

        async fn update_token(&self, user_id: UserId, push_token: &str) -> SyncResult<()> {
            self.delay().await;
            Self::injected(&self.token_failure)?;
            self.tokens
                .lock()
                .unwrap()
                .insert(user_id, push_token.to_string());
            Ok(())
        }

        async fn get_infection_status(&self, user_id: UserId) -> SyncResult<bool> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.delay().await;
            Self::injected(&self.status_failure)?;
            Ok(self.infected.lock().unwrap().contains(&user_id))
        }
    }
}
