//! Radio capability abstraction.
//!
//! The host supplies something implementing [`Radio`]: a BLE stack, a
//! simulator, or [`NoRadio`] on hardware without one. Sightings flow back
//! through the [`DiscoverySink`] handed to [`Radio::start_scan`].

use crate::error::{RadioError, RadioResult};
use async_trait::async_trait;
use contrace_types::{EphemeralId, Timestamp};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

/// Service UUID under which ephemeral ids are advertised and filtered.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1234_0000_1000_8000_0080_5f9b_34fb);

/// One sighting of a nearby advertiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    /// The ephemeral id found in the advertisement.
    pub peer: EphemeralId,
    /// Received signal strength (dBm).
    pub rssi: i32,
    /// When the sighting was made.
    pub seen_at: Timestamp,
}

/// What the local device broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub service_uuid: Uuid,
    pub ephemeral_id: EphemeralId,
}

impl Advertisement {
    /// Advertisement carrying `ephemeral_id` under [`SERVICE_UUID`].
    #[must_use]
    pub fn new(ephemeral_id: EphemeralId) -> Self {
        Self {
            service_uuid: SERVICE_UUID,
            ephemeral_id,
        }
    }

    /// Service-data bytes placed in the advertisement.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        self.ephemeral_id.to_payload()
    }
}

/// Non-blocking handle radio callbacks use to report sightings.
///
/// Cheap to clone. Delivery never waits: if the detector falls behind and
/// the queue is full, the sighting is dropped. The next scan window will
/// report the peer again.
#[derive(Debug, Clone)]
pub struct DiscoverySink {
    tx: mpsc::Sender<DiscoveryEvent>,
}

impl DiscoverySink {
    pub(crate) fn new(tx: mpsc::Sender<DiscoveryEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiving end of its bounded queue.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DiscoveryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queues a decoded sighting. Returns whether it was accepted.
    pub fn deliver(&self, event: DiscoveryEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(peer = %event.peer, "discovery queue full, dropping sighting");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Decodes a raw service-data payload and queues it.
    ///
    /// Payloads that are not a well-formed ephemeral id are ignored.
    pub fn deliver_payload(&self, payload: &[u8], rssi: i32, seen_at: Timestamp) -> bool {
        match EphemeralId::from_payload(payload) {
            Ok(peer) => self.deliver(DiscoveryEvent { peer, rssi, seen_at }),
            Err(e) => {
                debug!("ignoring foreign advertisement: {e}");
                false
            }
        }
    }

    /// Whether the detector side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Scan/advertise capability of the host device.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Whether scanning and advertising are possible at all.
    fn is_available(&self) -> bool;

    /// Starts scanning; sightings are reported through `sink`.
    async fn start_scan(&self, sink: DiscoverySink) -> RadioResult<()>;

    /// Stops scanning. Must be safe to call when not scanning.
    async fn stop_scan(&self) -> RadioResult<()>;

    /// Starts broadcasting `advertisement`.
    async fn start_advertising(&self, advertisement: Advertisement) -> RadioResult<()>;

    /// Stops broadcasting. Must be safe to call when not advertising.
    async fn stop_advertising(&self) -> RadioResult<()>;
}

/// Stand-in for devices without a radio. Every operation is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRadio;

#[async_trait]
impl Radio for NoRadio {
    fn is_available(&self) -> bool {
        false
    }

    async fn start_scan(&self, _sink: DiscoverySink) -> RadioResult<()> {
        Err(RadioError::Unavailable)
    }

    async fn stop_scan(&self) -> RadioResult<()> {
        Err(RadioError::Unavailable)
    }

    async fn start_advertising(&self, _advertisement: Advertisement) -> RadioResult<()> {
        Err(RadioError::Unavailable)
    }

    async fn stop_advertising(&self) -> RadioResult<()> {
        Err(RadioError::Unavailable)
    }
}

/// A scriptable radio for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A call made against [`MockRadio`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RadioCall {
        StartScan,
        StopScan,
        StartAdvertising(EphemeralId),
        StopAdvertising,
    }

    /// Records every call and lets tests inject sightings.
    #[derive(Debug, Default)]
    pub struct MockRadio {
        unavailable: bool,
        calls: Mutex<Vec<RadioCall>>,
        sink: Mutex<Option<DiscoverySink>>,
        scanning: Mutex<bool>,
        advertising: Mutex<Option<EphemeralId>>,
        scan_start_failures: AtomicUsize,
        advertise_start_failures: AtomicUsize,
    }

    impl MockRadio {
        /// A working radio.
        pub fn new() -> Self {
            Self::default()
        }

        /// A radio that reports itself unavailable.
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }

        /// Makes the next `n` scan starts fail.
        pub fn fail_next_scan_starts(&self, n: usize) {
            self.scan_start_failures.store(n, Ordering::SeqCst);
        }

        /// Makes the next `n` advertising starts fail.
        pub fn fail_next_advertise_starts(&self, n: usize) {
            self.advertise_start_failures.store(n, Ordering::SeqCst);
        }

        /// All calls so far, in order.
        pub fn calls(&self) -> Vec<RadioCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of recorded calls equal to `call`.
        pub fn count(&self, call: &RadioCall) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        /// Whether a scan is currently running.
        pub fn is_scanning(&self) -> bool {
            *self.scanning.lock().unwrap()
        }

        /// The ephemeral id currently advertised, if any.
        pub fn advertising(&self) -> Option<EphemeralId> {
            self.advertising.lock().unwrap().clone()
        }

        /// Reports a sighting as if the stack had seen it. Only delivered
        /// while scanning.
        pub fn emit(&self, peer: &EphemeralId, rssi: i32, seen_at: Timestamp) -> bool {
            if !self.is_scanning() {
                return false;
            }
            match self.sink.lock().unwrap().as_ref() {
                Some(sink) => sink.deliver_payload(&peer.to_payload(), rssi, seen_at),
                None => false,
            }
        }

        fn record(&self, call: RadioCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn take_failure(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl Radio for MockRadio {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        async fn start_scan(&self, sink: DiscoverySink) -> RadioResult<()> {
            self.record(RadioCall::StartScan);
            if Self::take_failure(&self.scan_start_failures) {
                return Err(RadioError::Scan("injected failure".into()));
            }
            *self.sink.lock().unwrap() = Some(sink);
            *self.scanning.lock().unwrap() = true;
            Ok(())
        }

        async fn stop_scan(&self) -> RadioResult<()> {
            self.record(RadioCall::StopScan);
            *self.scanning.lock().unwrap() = false;
            Ok(())
        }

        async fn start_advertising(&self, advertisement: Advertisement) -> RadioResult<()> {
            self.record(RadioCall::StartAdvertising(advertisement.ephemeral_id.clone()));
            if Self::take_failure(&self.advertise_start_failures) {
                return Err(RadioError::Advertise("injected failure".into()));
            }
            *self.advertising.lock().unwrap() = Some(advertisement.ephemeral_id);
            Ok(())
        }

        async fn stop_advertising(&self) -> RadioResult<()> {
            self.record(RadioCall::StopAdvertising);
            *self.advertising.lock().unwrap() = None;
            Ok(())
        }
    }
}
