//! Proximity detection for contrace.
//!
//! Turns a noisy, intermittent stream of radio sightings into discrete
//! [`Contact`](contrace_types::Contact) records, and keeps the local device
//! scanning and advertising on a power-friendly schedule.
//!
//! # Components
//!
//! - **Distance**: log-distance path-loss model mapping RSSI to meters
//! - **Radio**: the abstract scan/advertise capability the host provides
//! - **Detector**: per-peer episode tracking, emits contacts
//! - **Scheduler**: scan duty cycle and ephemeral id rotation loops
//! - **Session**: starts and stops all of the above as one unit
//!
//! # Data flow
//!
//! ```text
//! Radio ──DiscoverySink──▶ bounded queue ──▶ detector task ──▶ ContactStore
//!   ▲
//!   └── scan loop (on/off)      rotation loop (IdentityCell, Preferences)
//! ```
//!
//! The detector owns its detection map outright; radio callbacks only ever
//! push into the queue, so no lock guards the map.

mod config;
pub mod detector;
pub mod distance;
mod error;
pub mod radio;
pub mod scheduler;
mod session;

pub use config::TracingConfig;
pub use detector::{run_detector, EncounterDetector};
pub use distance::{
    estimate_distance, is_within_range, DistanceEstimator, MEASURED_POWER_AT_1M,
    PATH_LOSS_EXPONENT, RSSI_THRESHOLD,
};
pub use error::{RadioError, RadioResult};
pub use radio::{Advertisement, DiscoveryEvent, DiscoverySink, NoRadio, Radio, SERVICE_UUID};
pub use session::{SessionServices, SessionState, TracingSession};
