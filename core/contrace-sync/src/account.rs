//! Onboarding and push token upkeep.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteService;
use contrace_crypto::Identity;
use contrace_storage::{run_blocking, Preferences};
use contrace_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What [`Account::initialize`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Onboarding {
    /// Identity already existed; nothing was sent.
    Existing(Identity),
    /// Fresh identity, registered with the remote.
    Registered(Identity),
    /// Fresh identity, but registration failed. The device works offline.
    Offline(Identity, SyncError),
}

impl Onboarding {
    pub fn identity(&self) -> Identity {
        match self {
            Self::Existing(id) | Self::Registered(id) | Self::Offline(id, _) => *id,
        }
    }
}

/// The local user's standing with the remote service.
pub struct Account {
    preferences: Arc<Preferences>,
    remote: Arc<dyn RemoteService>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl Account {
    pub fn new(
        preferences: Arc<Preferences>,
        remote: Arc<dyn RemoteService>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            preferences,
            remote,
            clock,
            timeout,
        }
    }

    /// First-run setup.
    ///
    /// Creates and persists the stable user and device ids if none exist,
    /// stores the push token (or an `offline_token_<millis>` placeholder
    /// when the host has none) and registers with the remote. Existing ids
    /// are never replaced.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned; a failed registration yields
    /// [`Onboarding::Offline`].
    pub async fn initialize(&self, push_token: Option<String>) -> SyncResult<Onboarding> {
        let preferences = Arc::clone(&self.preferences);
        let (identity, created) =
            run_blocking(move || preferences.load_or_create_identity()).await?;
        if !created {
            return Ok(Onboarding::Existing(identity));
        }
        info!("created new identity");

        let token = push_token
            .unwrap_or_else(|| format!("offline_token_{}", self.clock.now().as_millis()));
        let preferences = Arc::clone(&self.preferences);
        let stored = token.clone();
        run_blocking(move || preferences.set_push_token(&stored)).await?;

        match self
            .bounded(self.remote.register_user(identity.user_id, &token))
            .await
        {
            Ok(()) => Ok(Onboarding::Registered(identity)),
            Err(e) => {
                warn!("registration failed, continuing offline: {e}");
                Ok(Onboarding::Offline(identity, e))
            }
        }
    }

    /// Persists a refreshed push token and forwards it to the remote if a
    /// user exists.
    ///
    /// # Errors
    ///
    /// Storage failures, or the remote's error when the update fails. The
    /// token stays persisted either way.
    pub async fn on_new_token(&self, token: &str) -> SyncResult<()> {
        let preferences = Arc::clone(&self.preferences);
        let stored = token.to_string();
        let user_id = run_blocking(move || {
            preferences.set_push_token(&stored)?;
            preferences.user_id()
        })
        .await?;

        let Some(user_id) = user_id else {
            return Ok(());
        };
        self.bounded(self.remote.update_token(user_id, token)).await
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(SyncError::Timeout))
    }
}
