//! Tracing session lifecycle.

use crate::config::TracingConfig;
use crate::detector::{run_detector, EncounterDetector};
use crate::error::{RadioError, RadioResult};
use crate::radio::{DiscoverySink, Radio};
use crate::scheduler::{rotate, run_rotation_loop, run_scan_loop, RotationContext};
use contrace_crypto::IdentityCell;
use contrace_storage::{ContactStore, Preferences};
use contrace_types::Clock;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared state a session reads and writes.
#[derive(Clone)]
pub struct SessionServices {
    pub identity: Arc<IdentityCell>,
    pub preferences: Arc<Preferences>,
    pub store: Arc<dyn ContactStore>,
    pub clock: Arc<dyn Clock>,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Scanning, advertising and detecting.
    Active,
    /// No radio on this device; the session does nothing.
    Degraded,
    /// Stopped; radio resources released.
    Stopped,
}

/// A running scan/advertise/detect unit.
///
/// Dropping a session without calling [`stop`](Self::stop) still signals
/// its tasks to wind down and release the radio, but does not wait for them.
pub struct TracingSession {
    state: SessionState,
    sink: Option<DiscoverySink>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
    radio: Arc<dyn Radio>,
}

impl TracingSession {
    /// Starts tracing.
    ///
    /// Opens a fresh rotation epoch, starts advertising its ephemeral id and
    /// spawns the detector, scan loop and rotation loop. On a device without
    /// a radio this returns a [`SessionState::Degraded`] session instead of
    /// failing. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError::Storage`] if the rotation time cannot be
    /// persisted. Radio failures are logged, not returned.
    pub async fn start(
        radio: Arc<dyn Radio>,
        services: SessionServices,
        config: TracingConfig,
    ) -> RadioResult<Self> {
        if !radio.is_available() {
            warn!("radio unavailable, tracing disabled");
            return Ok(Self {
                state: SessionState::Degraded,
                sink: None,
                shutdown: None,
                tasks: Vec::new(),
                radio,
            });
        }

        let rotation = RotationContext {
            identity: Arc::clone(&services.identity),
            preferences: Arc::clone(&services.preferences),
            clock: Arc::clone(&services.clock),
        };
        rotate(radio.as_ref(), &rotation)
            .await
            .map_err(|e| RadioError::Storage(e.to_string()))?;

        let owner = services.identity.snapshot().user_id();
        let (sink, events) = DiscoverySink::channel(config.discovery_queue_capacity);
        let (shutdown, stop_rx) = watch::channel(false);

        let detector = EncounterDetector::new(owner, &config);
        let tasks = vec![
            tokio::spawn(run_detector(
                detector,
                events,
                Arc::clone(&services.store),
                stop_rx.clone(),
            )),
            tokio::spawn(run_scan_loop(
                Arc::clone(&radio),
                sink.clone(),
                config.scan_period(),
                stop_rx.clone(),
            )),
            tokio::spawn(run_rotation_loop(
                Arc::clone(&radio),
                rotation,
                config.id_rotation_interval(),
                config.rotation_pause(),
                stop_rx,
            )),
        ];

        info!("tracing session started");
        Ok(Self {
            state: SessionState::Active,
            sink: Some(sink),
            shutdown: Some(shutdown),
            tasks,
            radio,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for delivering sightings from host radio callbacks.
    /// `None` when the session is degraded or stopped.
    #[must_use]
    pub fn sink(&self) -> Option<DiscoverySink> {
        self.sink.clone()
    }

    /// Stops every loop and waits for them to release the radio.
    ///
    /// Active detection entries are discarded without emitting contacts.
    /// Calling this more than once is harmless.
    pub async fn stop(&mut self) {
        if self.state != SessionState::Active {
            self.state = SessionState::Stopped;
            return;
        }
        self.sink = None;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        let mut clean = true;
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("tracing task ended abnormally: {e}");
                clean = false;
            }
        }
        // A task that did not finish normally skipped its own cleanup.
        if !clean {
            if let Err(e) = self.radio.stop_scan().await {
                warn!("failed to stop scan: {e}");
            }
            if let Err(e) = self.radio.stop_advertising().await {
                warn!("failed to stop advertising: {e}");
            }
        }

        self.state = SessionState::Stopped;
        info!("tracing session stopped");
    }
}

impl Drop for TracingSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
    }
}
