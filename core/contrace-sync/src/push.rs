//! Push message handling.
//!
//! The delivery channel itself belongs to the host. It hands each message's
//! string data map to [`PushHandler::handle`].

use crate::error::SyncResult;
use contrace_storage::{run_blocking, Preferences};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Value of the `type` key for an exposure alert.
pub const EXPOSURE_ALERT: &str = "exposure_alert";
/// Value of the `type` key for an infection status update.
pub const INFECTION_UPDATE: &str = "infection_update";

/// A decoded push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMessage {
    /// A recorded contact has been flagged; no payload.
    ExposureAlert,
    /// The health authority changed this user's status.
    InfectionUpdate { is_infected: bool },
}

impl PushMessage {
    /// Decodes a push data map. Returns `None` for unknown or missing types.
    ///
    /// `isInfected` is a string; only a case-insensitive `"true"` counts,
    /// anything else (including absence) reads as `false`.
    pub fn from_data(data: &HashMap<String, String>) -> Option<Self> {
        match data.get("type").map(String::as_str) {
            Some(EXPOSURE_ALERT) => Some(Self::ExposureAlert),
            Some(INFECTION_UPDATE) => {
                let is_infected = data
                    .get("isInfected")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                Some(Self::InfectionUpdate { is_infected })
            }
            _ => None,
        }
    }
}

/// Applies push messages to local state.
pub struct PushHandler {
    preferences: Arc<Preferences>,
    alerts: broadcast::Sender<()>,
}

impl PushHandler {
    pub fn new(preferences: Arc<Preferences>) -> Self {
        let (alerts, _) = broadcast::channel(16);
        Self {
            preferences,
            alerts,
        }
    }

    /// Receives one `()` per exposure alert.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<()> {
        self.alerts.subscribe()
    }

    /// Decodes and applies a raw data map. Unknown messages are ignored.
    pub async fn handle(&self, data: &HashMap<String, String>) -> SyncResult<Option<PushMessage>> {
        let Some(message) = PushMessage::from_data(data) else {
            debug!("ignoring unknown push message");
            return Ok(None);
        };
        self.apply(message).await?;
        Ok(Some(message))
    }

    /// Applies a decoded message.
    pub async fn apply(&self, message: PushMessage) -> SyncResult<()> {
        match message {
            PushMessage::ExposureAlert => {
                info!("exposure alert received");
                // No subscribers is fine.
                let _ = self.alerts.send(());
            }
            PushMessage::InfectionUpdate { is_infected } => {
                info!(is_infected, "infection status pushed");
                let preferences = Arc::clone(&self.preferences);
                run_blocking(move || preferences.set_infected(is_infected)).await?;
            }
        }
        Ok(())
    }
}
