use std::time::Duration;
use time::OffsetDateTime;

/// Last time the device talked to us, by sensor report or command poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct Liveness {
    last_contact_at: Option<OffsetDateTime>,
}

impl Liveness {
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_contact_at = Some(now);
    }

    pub fn last_contact_at(&self) -> Option<OffsetDateTime> {
        self.last_contact_at
    }

    /// `None` until the first contact.
    pub fn seconds_since(&self, now: OffsetDateTime) -> Option<f64> {
        self.last_contact_at
            .map(|t| (now - t).as_seconds_f64().max(0.0))
    }

    /// A device that has never been heard from is unreachable.
    pub fn is_reachable(&self, now: OffsetDateTime, timeout: Duration) -> bool {
        self.seconds_since(now)
            .is_some_and(|elapsed| elapsed < timeout.as_secs_f64())
    }
}
