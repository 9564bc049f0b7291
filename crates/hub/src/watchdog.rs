//! Liveness watchdog: periodically checks whether the device is still polling
//! and records each reachable/unreachable edge. It only observes; actuator
//! state is never touched from here.

use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::control::{DeviceState, SharedState};

#[derive(Default)]
pub struct Watchdog {
    reachable: bool,
}

impl Watchdog {
    /// The device counts as unreachable until it first makes contact.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new reachability when it changed since the last check.
    pub fn observe(&mut self, st: &mut DeviceState, now: OffsetDateTime) -> Option<bool> {
        let reachable = st.is_reachable(now);
        if reachable == self.reachable {
            return None;
        }
        self.reachable = reachable;

        if reachable {
            info!("device reachable");
        } else {
            warn!("device lost contact");
        }
        st.record_liveness(reachable);
        Some(reachable)
    }
}

/// Run the watchdog loop. Intended to be `tokio::spawn`-ed from main.
pub async fn run(shared: SharedState, interval: Duration) {
    let mut watchdog = Watchdog::new();
    let mut ticker = tokio::time::interval(interval);

    info!(interval_sec = interval.as_secs(), "liveness watchdog started");

    loop {
        ticker.tick().await;
        let now = OffsetDateTime::now_utc();
        let mut st = shared.write().await;
        watchdog.observe(&mut st, now);
    }
}
