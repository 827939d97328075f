use contrace_crypto::{Identity, IdentityCell};
use contrace_radio::radio::mock::{MockRadio, RadioCall};
use contrace_radio::scheduler::{run_rotation_loop, run_scan_loop, RotationContext};
use contrace_radio::{
    Advertisement, DiscoverySink, NoRadio, Radio, RadioError, SessionServices, SessionState,
    TracingConfig, TracingSession, SERVICE_UUID,
};
use contrace_storage::{ContactStore, Preferences, SqliteContactStore};
use contrace_types::{Clock, EphemeralId, ManualClock, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

const START: Timestamp = Timestamp::from_millis(1_700_000_000_000);

struct Fixture {
    radio: Arc<MockRadio>,
    identity: Arc<IdentityCell>,
    preferences: Arc<Preferences>,
    store: Arc<SqliteContactStore>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new(radio: MockRadio) -> Self {
        Self {
            radio: Arc::new(radio),
            identity: Arc::new(IdentityCell::new(Identity::generate(), Timestamp::EPOCH)),
            preferences: Arc::new(Preferences::open_in_memory().unwrap()),
            store: Arc::new(SqliteContactStore::open_in_memory().unwrap()),
            clock: Arc::new(ManualClock::new(START)),
        }
    }

    fn services(&self) -> SessionServices {
        SessionServices {
            identity: self.identity.clone(),
            preferences: self.preferences.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }

    fn rotation(&self) -> RotationContext {
        RotationContext {
            identity: self.identity.clone(),
            preferences: self.preferences.clone(),
            clock: self.clock.clone(),
        }
    }

    async fn start(&self) -> TracingSession {
        TracingSession::start(self.radio.clone(), self.services(), TracingConfig::default())
            .await
            .unwrap()
    }
}

fn peer() -> EphemeralId {
    EphemeralId::parse("00ff00ff00ff00ff").unwrap()
}

// ── Session lifecycle ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_rotates_and_advertises() {
    let fx = Fixture::new(MockRadio::new());
    let session = fx.start().await;

    assert_eq!(session.state(), SessionState::Active);
    let snapshot = fx.identity.snapshot();
    assert_eq!(snapshot.rotated_at, START);
    assert_eq!(fx.radio.advertising(), Some(snapshot.ephemeral_id.clone()));
    assert_eq!(fx.preferences.last_rotation().unwrap(), START);
}

#[tokio::test(start_paused = true)]
async fn sightings_during_session_become_contacts() {
    let fx = Fixture::new(MockRadio::new());
    let mut session = fx.start().await;
    sleep(Duration::from_millis(1)).await;
    assert!(fx.radio.is_scanning());

    let p = peer();
    assert!(fx.radio.emit(&p, -60, START));
    assert!(fx.radio.emit(&p, -60, START.saturating_add(Duration::from_secs(70))));
    assert!(fx.radio.emit(&p, -60, START.saturating_add(Duration::from_secs(75))));
    sleep(Duration::from_millis(10)).await;

    let contacts = fx.store.query_unsynced().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].duration_millis, 70_000);
    assert_eq!(contacts[0].user_id, fx.identity.snapshot().user_id());
    assert_eq!(contacts[0].encountered_user_id, p);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_releases_radio() {
    let fx = Fixture::new(MockRadio::new());
    let mut session = fx.start().await;
    sleep(Duration::from_secs(3)).await;
    assert!(fx.radio.is_scanning());

    session.stop().await;

    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.sink().is_none());
    assert!(!fx.radio.is_scanning());
    assert_eq!(fx.radio.advertising(), None);
    assert!(fx.radio.count(&RadioCall::StopScan) >= 1);
    assert!(fx.radio.count(&RadioCall::StopAdvertising) >= 1);

    // Idempotent.
    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn dropping_session_releases_radio() {
    let fx = Fixture::new(MockRadio::new());
    let session = fx.start().await;
    sleep(Duration::from_millis(1)).await;

    drop(session);
    sleep(Duration::from_millis(1)).await;

    assert!(!fx.radio.is_scanning());
    assert_eq!(fx.radio.advertising(), None);
}

#[tokio::test(start_paused = true)]
async fn unavailable_radio_degrades() {
    let fx = Fixture::new(MockRadio::unavailable());
    let mut session = fx.start().await;

    assert_eq!(session.state(), SessionState::Degraded);
    assert!(session.sink().is_none());
    assert!(fx.radio.calls().is_empty());
    assert_eq!(fx.preferences.last_rotation().unwrap(), Timestamp::EPOCH);

    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn no_radio_refuses_everything() {
    let radio = NoRadio;
    let (sink, _rx) = DiscoverySink::channel(1);
    assert!(!radio.is_available());
    assert_eq!(radio.start_scan(sink).await, Err(RadioError::Unavailable));
    assert_eq!(
        radio
            .start_advertising(Advertisement::new(peer()))
            .await,
        Err(RadioError::Unavailable)
    );

    let fx = Fixture::new(MockRadio::new());
    let session = TracingSession::start(Arc::new(NoRadio), fx.services(), TracingConfig::default())
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Degraded);
}

#[tokio::test(start_paused = true)]
async fn advertise_failure_does_not_abort_start() {
    let radio = MockRadio::new();
    radio.fail_next_advertise_starts(1);
    let fx = Fixture::new(radio);

    let mut session = fx.start().await;
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(fx.radio.advertising(), None);
    session.stop().await;
}

// ── Scan loop ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scan_loop_duty_cycles() {
    let radio = Arc::new(MockRadio::new());
    let (sink, _rx) = DiscoverySink::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let period = Duration::from_secs(10);

    let task = tokio::spawn(run_scan_loop(radio.clone(), sink, period, stop_rx));

    sleep(Duration::from_secs(5)).await;
    assert!(radio.is_scanning());
    sleep(Duration::from_secs(10)).await;
    assert!(!radio.is_scanning());
    sleep(Duration::from_secs(10)).await;
    assert!(radio.is_scanning());
    assert_eq!(radio.count(&RadioCall::StartScan), 2);

    stop_tx.send(true).unwrap();
    task.await.unwrap();
    assert!(!radio.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn scan_loop_survives_start_failure() {
    let radio = Arc::new(MockRadio::new());
    radio.fail_next_scan_starts(1);
    let (sink, _rx) = DiscoverySink::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run_scan_loop(
        radio.clone(),
        sink,
        Duration::from_secs(10),
        stop_rx,
    ));

    sleep(Duration::from_secs(5)).await;
    assert!(!radio.is_scanning());
    sleep(Duration::from_secs(20)).await;
    assert!(radio.is_scanning());

    stop_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scan_loop_stops_mid_period() {
    let radio = Arc::new(MockRadio::new());
    let (sink, _rx) = DiscoverySink::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run_scan_loop(
        radio.clone(),
        sink,
        Duration::from_secs(3600),
        stop_rx,
    ));
    sleep(Duration::from_millis(1)).await;

    let before = tokio::time::Instant::now();
    stop_tx.send(true).unwrap();
    task.await.unwrap();

    assert!(before.elapsed() < Duration::from_secs(1));
    assert_eq!(radio.calls().last(), Some(&RadioCall::StopScan));
}

// ── Rotation loop ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rotation_loop_advertises_new_epoch() {
    let fx = Fixture::new(MockRadio::new());
    let (stop_tx, stop_rx) = watch::channel(false);
    let interval = Duration::from_secs(15 * 60);
    let pause = Duration::from_secs(1);
    let first = fx.identity.snapshot();

    let task = tokio::spawn(run_rotation_loop(
        fx.radio.clone(),
        fx.rotation(),
        interval,
        pause,
        stop_rx,
    ));

    fx.clock.advance(interval);
    sleep(interval + Duration::from_millis(500)).await;
    // Paused between stop and start.
    assert_eq!(fx.radio.advertising(), None);

    sleep(Duration::from_secs(1)).await;
    let second = fx.identity.snapshot();
    assert_ne!(second.ephemeral_id, first.ephemeral_id);
    assert_eq!(second.rotated_at, fx.clock.now());
    assert_eq!(fx.radio.advertising(), Some(second.ephemeral_id.clone()));
    assert_eq!(fx.preferences.last_rotation().unwrap(), fx.clock.now());

    stop_tx.send(true).unwrap();
    task.await.unwrap();
    assert_eq!(fx.radio.advertising(), None);
    assert_eq!(fx.radio.calls().last(), Some(&RadioCall::StopAdvertising));
}

// ── Sink ────────────────────────────────────────────────────────

#[tokio::test]
async fn sink_drops_foreign_payloads() {
    let (sink, mut rx) = DiscoverySink::channel(4);

    assert!(!sink.deliver_payload(b"not an id", -50, START));
    assert!(sink.deliver_payload(&peer().to_payload(), -50, START));

    let event = rx.recv().await.unwrap();
    assert_eq!(event.peer, peer());
    assert_eq!(event.rssi, -50);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn full_sink_drops_sightings() {
    let (sink, _rx) = DiscoverySink::channel(1);
    assert!(sink.deliver_payload(&peer().to_payload(), -50, START));
    assert!(!sink.deliver_payload(&peer().to_payload(), -50, START));
}

#[test]
fn advertisement_uses_service_uuid() {
    let ad = Advertisement::new(peer());
    assert_eq!(ad.service_uuid, SERVICE_UUID);
    assert_eq!(
        SERVICE_UUID.to_string(),
        "00001234-0000-1000-8000-00805f9b34fb"
    );
    assert_eq!(EphemeralId::from_payload(&ad.payload()).unwrap(), peer());
}
