//! The control core: one `DeviceState` behind one lock.
//!
//! Fields are private to this module tree. The command surface reads through
//! `status` / `commands` and mutates only through the mode controller
//! (`mode.rs`), the fire subsystem (`fire.rs`) and sensor intake
//! (`sensors.rs`), each of which runs as a single `&mut self` call under the
//! write guard.

pub mod fire;
pub mod irrigation;
pub mod liveness;
pub mod mode;
pub mod sensors;

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::config::PolicyConfig;
use liveness::Liveness;
use sensors::Reading;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<DeviceState>>;

// ---------------------------------------------------------------------------
// Modes and actuator positions
// ---------------------------------------------------------------------------

/// Effective control mode as seen by the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Manual,
    Auto,
    FireEmergency,
}

/// Which exclusive mode the operator asked for. `None` after a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedMode {
    None,
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServoPosition {
    /// Centred, no spray.
    Idle,
    /// Fixed 180° toward field 1.
    State1,
    /// Sweeping 0-160°, covers field 2 and fire suppression.
    State2,
}

/// On/off as the device firmware expects it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Switch {
    On,
    Off,
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

pub use fire::FireSubmode;

// ---------------------------------------------------------------------------
// Device state
// ---------------------------------------------------------------------------

pub struct DeviceState {
    policy: PolicyConfig,
    liveness: Liveness,
    liveness_timeout: Duration,
    started_at: Instant,

    field1_reading: Option<Reading>,
    field2_reading: Option<Reading>,
    fire_detected: bool,

    pump_on: bool,
    servo: ServoPosition,
    fire_relay_on: bool,

    field1_active: bool,
    field2_active: bool,

    requested: RequestedMode,
    fire_active: bool,
    fire_submode: FireSubmode,
    manual_alarm_latched: bool,

    events: VecDeque<SystemEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Mode,
    Fire,
    Irrigation,
    Alarm,
    Liveness,
    System,
}

// ---------------------------------------------------------------------------
// JSON responses (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub mode: Mode,
    pub requested_mode: RequestedMode,
    pub manual_mode_active: bool,
    pub auto_mode_active: bool,
    pub fire_enabled: bool,
    pub fire_emergency_submode: FireSubmode,
    pub fire_detected: bool,
    pub sensor1: Option<Reading>,
    pub sensor2: Option<Reading>,
    pub pump_on: bool,
    pub servo_state: ServoPosition,
    pub fire_relay_on: bool,
    pub buzzer_on: bool,
    pub manual_alarm_latched: bool,
    pub field1_active: bool,
    pub field2_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_contact_at: Option<OffsetDateTime>,
    pub seconds_since_contact: Option<f64>,
    pub reachable: bool,
    pub events: Vec<SystemEvent>,
}

/// What the device applies on its next poll.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub pump: Switch,
    pub servo: ServoPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_relay: Option<Switch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzzer: Option<Switch>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

// ---------------------------------------------------------------------------
// Construction & reads
// ---------------------------------------------------------------------------

impl DeviceState {
    /// Power-on defaults: manual requested, fire mode off, everything stopped.
    pub fn new(policy: PolicyConfig, liveness_timeout: Duration) -> Self {
        Self {
            policy,
            liveness: Liveness::default(),
            liveness_timeout,
            started_at: Instant::now(),
            field1_reading: None,
            field2_reading: None,
            fire_detected: false,
            pump_on: false,
            servo: ServoPosition::Idle,
            fire_relay_on: false,
            field1_active: false,
            field2_active: false,
            requested: RequestedMode::Manual,
            fire_active: false,
            fire_submode: FireSubmode::Off,
            manual_alarm_latched: false,
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn mode(&self) -> Mode {
        match (self.fire_active, self.requested) {
            (true, _) => Mode::FireEmergency,
            (false, RequestedMode::Auto) => Mode::Auto,
            (false, _) => Mode::Manual,
        }
    }

    pub fn requested(&self) -> RequestedMode {
        self.requested
    }

    pub fn buzzer_on(&self) -> bool {
        self.fire_relay_on || self.manual_alarm_latched
    }

    pub fn is_reachable(&self, now: OffsetDateTime) -> bool {
        self.liveness.is_reachable(now, self.liveness_timeout)
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn status(&self, now: OffsetDateTime) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            mode: self.mode(),
            requested_mode: self.requested(),
            manual_mode_active: self.requested == RequestedMode::Manual,
            auto_mode_active: self.requested == RequestedMode::Auto,
            fire_enabled: self.policy.fire_enabled,
            fire_emergency_submode: self.fire_submode,
            fire_detected: self.fire_detected,
            sensor1: self.field1_reading,
            sensor2: self.field2_reading,
            pump_on: self.pump_on,
            servo_state: self.servo,
            fire_relay_on: self.fire_relay_on,
            buzzer_on: self.buzzer_on(),
            manual_alarm_latched: self.manual_alarm_latched,
            field1_active: self.field1_active,
            field2_active: self.field2_active,
            last_contact_at: self.liveness.last_contact_at(),
            seconds_since_contact: self.liveness.seconds_since(now),
            reachable: self.is_reachable(now),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    /// Actuator command set for the device. The poll itself is contact.
    pub fn commands(&mut self, now: OffsetDateTime) -> CommandResponse {
        self.liveness.touch(now);

        let fire = self.policy.fire_enabled;
        CommandResponse {
            pump: self.pump_on.into(),
            servo: self.servo,
            fire_relay: fire.then(|| self.fire_relay_on.into()),
            buzzer: fire.then(|| self.buzzer_on().into()),
            timestamp: now,
        }
    }

    // -----------------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------------

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    /// Record a reachability edge seen by the watchdog.
    pub fn record_liveness(&mut self, reachable: bool) {
        let detail = if reachable {
            "device reachable".to_string()
        } else {
            format!(
                "device lost contact (no poll or report for {}s)",
                self.liveness_timeout.as_secs()
            )
        };
        self.push_event(EventKind::Liveness, detail);
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail,
        });
    }

    /// Stop pump and centre the servo.
    fn stop_actuators(&mut self) {
        self.pump_on = false;
        self.servo = ServoPosition::Idle;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
