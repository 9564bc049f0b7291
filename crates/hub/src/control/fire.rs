//! Fire-emergency policy and the manual alarm.
//!
//! Fire emergency is an override layer on top of the requested mode. While it
//! is active the pump sprays with the servo sweeping, the relay and buzzer are
//! on, and irrigation is suspended. Leaving it hands control back to whichever
//! mode was requested.

use serde::Serialize;
use std::str::FromStr;
use tracing::{info, warn};

use super::{DeviceState, EventKind, ServoPosition};
use crate::error::{ControlError, Result};

/// How fire emergency is triggered, independent of MANUAL/AUTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FireSubmode {
    Off,
    /// Follow the fire sensor.
    Auto,
    /// Operator-forced suppression regardless of the sensor.
    Manual,
}

impl FromStr for FireSubmode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(ControlError::InvalidInput(format!(
                "unknown fire mode '{other}' (use auto, manual or off)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireAction {
    Activate,
    Deactivate,
    Hold,
}

/// Re-derive activation from the submode and the latest sensor value.
pub fn evaluate(submode: FireSubmode, fire_detected: bool, active: bool) -> FireAction {
    match submode {
        FireSubmode::Manual => FireAction::Activate,
        FireSubmode::Auto if fire_detected => FireAction::Activate,
        _ if active => FireAction::Deactivate,
        _ => FireAction::Hold,
    }
}

impl DeviceState {
    pub(super) fn require_fire_enabled(&self) -> Result<()> {
        if self.policy.fire_enabled {
            Ok(())
        } else {
            Err(ControlError::InvalidInput(
                "fire subsystem is not enabled on this controller".to_string(),
            ))
        }
    }

    pub(super) fn activate_fire(&mut self) {
        let entering = !self.fire_active;

        self.fire_active = true;
        self.field1_active = false;
        self.field2_active = false;
        self.pump_on = true;
        self.servo = ServoPosition::State2;
        self.fire_relay_on = true;

        if entering {
            warn!(
                submode = ?self.fire_submode,
                fire_detected = self.fire_detected,
                "fire emergency activated"
            );
            self.push_event(
                EventKind::Fire,
                format!("fire emergency activated ({:?})", self.fire_submode),
            );
        }
    }

    pub(super) fn deactivate_fire(&mut self) {
        self.fire_active = false;
        self.fire_submode = FireSubmode::Off;
        self.fire_relay_on = false;
        self.stop_actuators();

        info!(resumed = ?self.mode(), "fire emergency cleared");
        self.push_event(
            EventKind::Fire,
            format!("fire emergency cleared, back to {:?}", self.mode()),
        );
    }

    /// Apply `evaluate` to the current state. Returns whether fire emergency
    /// is active afterwards.
    pub(super) fn apply_fire_policy(&mut self) -> bool {
        match evaluate(self.fire_submode, self.fire_detected, self.fire_active) {
            FireAction::Activate => self.activate_fire(),
            FireAction::Deactivate => self.deactivate_fire(),
            FireAction::Hold => {}
        }
        self.fire_active
    }

    /// Latch the operator alarm. The buzzer stays on until `alarm_off`.
    pub fn alarm_on(&mut self) -> Result<()> {
        self.require_fire_enabled()?;
        if !self.manual_alarm_latched {
            self.manual_alarm_latched = true;
            info!("manual alarm latched");
            self.push_event(EventKind::Alarm, "manual alarm on".to_string());
        }
        Ok(())
    }

    pub fn alarm_off(&mut self) -> Result<()> {
        self.require_fire_enabled()?;
        if self.fire_detected {
            return Err(ControlError::AlarmLatchBlocked);
        }
        if self.manual_alarm_latched {
            self.manual_alarm_latched = false;
            info!("manual alarm released");
            self.push_event(EventKind::Alarm, "manual alarm off".to_string());
        }
        Ok(())
    }
}
