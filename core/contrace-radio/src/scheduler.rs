//! Duty-cycle loops.
//!
//! Two loops run for the lifetime of a tracing session: the scan loop
//! toggles scanning on and off with a symmetric period, and the rotation
//! loop moves advertising to a fresh ephemeral id on a fixed interval.
//! Neither knows about the other or about the detector. Radio errors are
//! logged and the loop carries on with its next cycle.
//!
//! Both loops exit as soon as the shutdown flag is raised, including in the
//! middle of a wait, and release the radio on the way out.

use crate::radio::{Advertisement, DiscoverySink, Radio};
use contrace_crypto::IdentityCell;
use contrace_storage::{run_blocking, Preferences, StorageResult};
use contrace_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Resolves once shutdown has been requested or the sender is gone.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleeps for `period`. Returns `true` if shutdown interrupted the wait.
async fn wait(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        () = stop_requested(shutdown) => true,
        () = tokio::time::sleep(period) => false,
    }
}

/// Alternates `period` of scanning with `period` of silence.
pub async fn run_scan_loop(
    radio: Arc<dyn Radio>,
    sink: DiscoverySink,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(period_ms = period.as_millis() as u64, "scan loop started");
    loop {
        if let Err(e) = radio.start_scan(sink.clone()).await {
            warn!("failed to start scan: {e}");
        }
        if wait(period, &mut shutdown).await {
            break;
        }
        if let Err(e) = radio.stop_scan().await {
            warn!("failed to stop scan: {e}");
        }
        if wait(period, &mut shutdown).await {
            break;
        }
    }

    if let Err(e) = radio.stop_scan().await {
        warn!("failed to stop scan on shutdown: {e}");
    }
    debug!("scan loop stopped");
}

/// Everything the rotation loop needs besides the radio.
#[derive(Clone)]
pub struct RotationContext {
    pub identity: Arc<IdentityCell>,
    pub preferences: Arc<Preferences>,
    pub clock: Arc<dyn Clock>,
}

/// Rotates the advertised ephemeral id every `interval`.
///
/// A rotation stops advertising, waits `pause` so the old id ages out of
/// nearby scan caches, derives the id for the new epoch, starts
/// advertising it and persists the rotation time.
pub async fn run_rotation_loop(
    radio: Arc<dyn Radio>,
    ctx: RotationContext,
    interval: Duration,
    pause: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(interval_ms = interval.as_millis() as u64, "rotation loop started");
    loop {
        if wait(interval, &mut shutdown).await {
            break;
        }
        if let Err(e) = radio.stop_advertising().await {
            warn!("failed to stop advertising for rotation: {e}");
        }
        if wait(pause, &mut shutdown).await {
            break;
        }
        if let Err(e) = rotate(radio.as_ref(), &ctx).await {
            warn!("failed to persist rotation time: {e}");
        }
    }

    if let Err(e) = radio.stop_advertising().await {
        warn!("failed to stop advertising on shutdown: {e}");
    }
    debug!("rotation loop stopped");
}

/// Starts a new epoch now and advertises its id.
///
/// Advertising failures are logged; only a failure to persist the rotation
/// time is returned.
pub(crate) async fn rotate(radio: &dyn Radio, ctx: &RotationContext) -> StorageResult<()> {
    let snapshot = ctx.identity.rotate(ctx.clock.now());
    info!(rotated_at = %snapshot.rotated_at, "ephemeral id rotated");

    if let Err(e) = radio
        .start_advertising(Advertisement::new(snapshot.ephemeral_id.clone()))
        .await
    {
        warn!("failed to start advertising: {e}");
    }

    let preferences = Arc::clone(&ctx.preferences);
    let at = snapshot.rotated_at;
    run_blocking(move || preferences.set_last_rotation(at)).await
}
