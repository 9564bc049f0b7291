//! Mode controller: MANUAL / AUTO requests, fire submode selection, and the
//! manual actuator commands gated on MANUAL.
//!
//! MANUAL and AUTO are mutually exclusive requests; switching between them
//! takes an explicit release first. Fire emergency is layered on top by
//! `fire.rs` and never changes which mode is requested.

use tracing::info;

use super::{DeviceState, EventKind, FireSubmode, RequestedMode, ServoPosition};
use crate::error::{ControlError, Result};

impl DeviceState {
    pub fn request_manual(&mut self) -> Result<()> {
        match self.requested {
            RequestedMode::Auto => Err(ControlError::ModeConflict(
                "Please deactivate auto mode first".to_string(),
            )),
            RequestedMode::Manual => Ok(()),
            RequestedMode::None => {
                self.set_requested(RequestedMode::Manual);
                Ok(())
            }
        }
    }

    /// Always leaves the pump off and the servo centred.
    pub fn release_manual(&mut self) {
        if self.requested == RequestedMode::Manual {
            self.set_requested(RequestedMode::None);
        }
        self.stop_actuators();
    }

    pub fn request_auto(&mut self) -> Result<()> {
        match self.requested {
            RequestedMode::Manual => Err(ControlError::ModeConflict(
                "Please deactivate manual mode first".to_string(),
            )),
            RequestedMode::Auto => Ok(()),
            RequestedMode::None => {
                self.set_requested(RequestedMode::Auto);
                Ok(())
            }
        }
    }

    /// Always leaves the pump off, the servo centred and both zones idle.
    pub fn release_auto(&mut self) {
        if self.requested == RequestedMode::Auto {
            self.set_requested(RequestedMode::None);
        }
        self.stop_actuators();
        self.field1_active = false;
        self.field2_active = false;
    }

    /// MANUAL sprays immediately; AUTO sprays now only if fire is already
    /// detected; OFF stands suppression down.
    pub fn set_fire_submode(&mut self, submode: FireSubmode) -> Result<()> {
        self.require_fire_enabled()?;

        if self.fire_submode != submode {
            info!(from = ?self.fire_submode, to = ?submode, "fire submode changed");
        }
        self.fire_submode = submode;

        match submode {
            FireSubmode::Manual => self.activate_fire(),
            FireSubmode::Auto if self.fire_detected => self.activate_fire(),
            FireSubmode::Auto => {}
            FireSubmode::Off if self.fire_active => self.deactivate_fire(),
            FireSubmode::Off => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Manual actuators
    // -----------------------------------------------------------------------

    fn require_manual(&self) -> Result<()> {
        if self.requested == RequestedMode::Manual {
            Ok(())
        } else {
            Err(ControlError::ModeNotActive)
        }
    }

    /// Turning the pump off also centres the servo.
    pub fn manual_pump(&mut self, on: bool) -> Result<()> {
        self.require_manual()?;
        if on {
            self.pump_on = true;
        } else {
            self.stop_actuators();
        }
        Ok(())
    }

    pub fn manual_servo(&mut self, position: ServoPosition) -> Result<()> {
        self.require_manual()?;
        self.servo = position;
        Ok(())
    }

    fn set_requested(&mut self, requested: RequestedMode) {
        info!(from = ?self.requested, to = ?requested, "requested mode changed");
        self.push_event(
            EventKind::Mode,
            format!("requested mode {:?} -> {:?}", self.requested, requested),
        );
        self.requested = requested;
    }
}
