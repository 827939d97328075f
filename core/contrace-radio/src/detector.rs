//! Encounter detection.
//!
//! Each peer ephemeral id moves through two states:
//!
//! ```text
//! Unseen ──in-range sighting──▶ Active ──gap > min duration──▶ Contact emitted,
//!                                  ▲                             entry reopened
//!                                  └─────────────────────────────────┘
//! ```
//!
//! An Active entry keeps two instants. `since` is where the current episode
//! was (re)opened and is what the contact threshold and duration are measured
//! from. `last_seen` moves on every in-range sighting and is only used to
//! forget peers that have gone quiet. Sustained co-presence is therefore
//! recorded as back-to-back contacts of roughly the minimum duration each.

use crate::config::TracingConfig;
use crate::distance::DistanceEstimator;
use crate::radio::DiscoveryEvent;
use crate::scheduler::stop_requested;
use contrace_storage::{run_blocking, ContactStore};
use contrace_types::{Contact, EphemeralId, Timestamp, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    since: Timestamp,
    last_seen: Timestamp,
}

/// Per-peer episode tracker.
///
/// Owned by exactly one task; nothing else touches the detection map.
#[derive(Debug)]
pub struct EncounterDetector {
    owner: UserId,
    min_contact_duration: Duration,
    stale_after: Duration,
    estimator: DistanceEstimator,
    entries: HashMap<EphemeralId, Entry>,
}

impl EncounterDetector {
    /// Creates a detector recording contacts on behalf of `owner`.
    #[must_use]
    pub fn new(owner: UserId, config: &TracingConfig) -> Self {
        Self {
            owner,
            min_contact_duration: config.min_contact_duration(),
            stale_after: config.stale_entry_after(),
            estimator: config.estimator(),
            entries: HashMap::new(),
        }
    }

    /// Applies one sighting. Returns the contact it closes, if any.
    pub fn observe(&mut self, event: &DiscoveryEvent) -> Option<Contact> {
        if !self.estimator.is_within_range(event.rssi) {
            return None;
        }
        let now = event.seen_at;

        let contact = match self.entries.get_mut(&event.peer) {
            None => {
                debug!(peer = %event.peer, rssi = event.rssi, "new peer in range");
                self.entries.insert(
                    event.peer.clone(),
                    Entry {
                        since: now,
                        last_seen: now,
                    },
                );
                None
            }
            Some(entry) => {
                let gap = now.saturating_since(entry.since);
                if gap > self.min_contact_duration {
                    *entry = Entry {
                        since: now,
                        last_seen: now,
                    };
                    Some(Contact::new(
                        self.owner,
                        event.peer.clone(),
                        now,
                        duration_millis(gap),
                        event.rssi,
                        self.estimator.estimate_distance(event.rssi),
                    ))
                } else {
                    entry.last_seen = entry.last_seen.max(now);
                    None
                }
            }
        };

        self.prune(now);
        contact
    }

    /// Number of peers currently in the Active state.
    #[must_use]
    pub fn active_peers(&self) -> usize {
        self.entries.len()
    }

    /// Last in-range sighting of `peer`, if it is Active.
    #[must_use]
    pub fn last_seen(&self, peer: &EphemeralId) -> Option<Timestamp> {
        self.entries.get(peer).map(|e| e.last_seen)
    }

    /// Drops every Active entry without emitting contacts.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn prune(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(self.stale_after);
        let before = self.entries.len();
        self.entries.retain(|_, e| e.last_seen >= cutoff);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(dropped, "forgot quiet peers");
        }
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Consumes discovery events until `shutdown` flips or every sink is gone.
///
/// Each emitted contact is written to `store` before the next event is
/// taken off the queue. A failed write is logged; the unsynced contact is
/// not retried here. The detection map is cleared on exit.
pub async fn run_detector(
    mut detector: EncounterDetector,
    mut events: mpsc::Receiver<DiscoveryEvent>,
    store: Arc<dyn ContactStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = stop_requested(&mut shutdown) => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(contact) = detector.observe(&event) else {
            continue;
        };

        info!(
            peer = %contact.encountered_user_id,
            duration_ms = contact.duration_millis,
            rssi = contact.rssi,
            "contact recorded"
        );
        let store = Arc::clone(&store);
        if let Err(e) = run_blocking(move || store.insert(&contact)).await {
            warn!("failed to persist contact: {e}");
        }
    }

    let discarded = detector.active_peers();
    detector.clear();
    debug!(discarded, "detector stopped");
}
