//! Auto-irrigation policy: a pure function from the two field readings and the
//! current zone flags to the next pump / servo / zone flags.
//!
//! Field 1 has strict priority. The pump and servo are shared, so at most one
//! zone runs at a time. A dry field pre-empts a zone that is only finishing
//! its hysteresis band.
//!
//! ```text
//! field 1 needs water ─────────────────────────────▶ Field1 (pump ON, STATE1)
//! field 2 needs water ─────────────────────────────▶ Field2 (pump ON, STATE2)
//! field 1 mid-cycle, not yet satisfied ─────────────▶ Field1
//! field 2 mid-cycle, not yet satisfied ─────────────▶ Field2
//! otherwise ───────────────────────────────────────▶ Idle   (pump OFF, IDLE)
//! ```

use crate::config::{PolicyConfig, SensorKind};

use super::sensors::Reading;
use super::ServoPosition;

/// Pump, servo and zone flags; the policy's whole output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrrigationState {
    pub pump_on: bool,
    pub servo: ServoPosition,
    pub field1_active: bool,
    pub field2_active: bool,
}

impl IrrigationState {
    pub const IDLE: Self = Self {
        pump_on: false,
        servo: ServoPosition::Idle,
        field1_active: false,
        field2_active: false,
    };

    pub const FIELD1: Self = Self {
        pump_on: true,
        servo: ServoPosition::State1,
        field1_active: true,
        field2_active: false,
    };

    pub const FIELD2: Self = Self {
        pump_on: true,
        servo: ServoPosition::State2,
        field1_active: false,
        field2_active: true,
    };
}

/// What one field's reading says about its soil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    NeedsWater,
    /// Inside the hysteresis band: keep doing whatever we were doing.
    InBand,
    Satisfied,
}

/// Mismatched kind/reading pairs are rejected at intake; here they read as
/// `InBand` so they can never start or stop a zone.
pub fn demand(kind: &SensorKind, reading: Reading) -> Demand {
    match (*kind, reading) {
        (
            SensorKind::Continuous {
                start_below,
                stop_at,
            },
            Reading::Percent(v),
        ) => {
            if v < start_below {
                Demand::NeedsWater
            } else if v >= stop_at {
                Demand::Satisfied
            } else {
                Demand::InBand
            }
        }
        (SensorKind::Boolean, Reading::Dry(true)) => Demand::NeedsWater,
        (SensorKind::Boolean, Reading::Dry(false)) => Demand::Satisfied,
        _ => Demand::InBand,
    }
}

pub fn decide(
    policy: &PolicyConfig,
    field1: Reading,
    field2: Reading,
    current: IrrigationState,
) -> IrrigationState {
    let d1 = demand(&policy.field1, field1);
    let d2 = demand(&policy.field2, field2);

    if d1 == Demand::NeedsWater {
        return IrrigationState::FIELD1;
    }
    if d2 == Demand::NeedsWater {
        return IrrigationState::FIELD2;
    }
    if current.field1_active && d1 != Demand::Satisfied {
        return IrrigationState::FIELD1;
    }
    if current.field2_active && d2 != Demand::Satisfied {
        return IrrigationState::FIELD2;
    }
    IrrigationState::IDLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn pct(v: f64) -> Reading {
        Reading::Percent(v)
    }

    fn policy_30_80() -> PolicyConfig {
        Config::fire_guard().policy()
    }

    // -- demand -------------------------------------------------------------

    #[test]
    fn continuous_demand_bands() {
        let kind = SensorKind::Continuous {
            start_below: 30.0,
            stop_at: 80.0,
        };
        assert_eq!(demand(&kind, pct(29.9)), Demand::NeedsWater);
        assert_eq!(demand(&kind, pct(30.0)), Demand::InBand);
        assert_eq!(demand(&kind, pct(79.9)), Demand::InBand);
        assert_eq!(demand(&kind, pct(80.0)), Demand::Satisfied);
    }

    #[test]
    fn no_band_flips_exactly() {
        let kind = SensorKind::Continuous {
            start_below: 50.0,
            stop_at: 50.0,
        };
        assert_eq!(demand(&kind, pct(49.0)), Demand::NeedsWater);
        assert_eq!(demand(&kind, pct(50.0)), Demand::Satisfied);
    }

    #[test]
    fn boolean_demand() {
        assert_eq!(demand(&SensorKind::Boolean, Reading::Dry(true)), Demand::NeedsWater);
        assert_eq!(demand(&SensorKind::Boolean, Reading::Dry(false)), Demand::Satisfied);
    }

    #[test]
    fn mismatched_reading_is_neutral() {
        assert_eq!(demand(&SensorKind::Boolean, pct(10.0)), Demand::InBand);
    }

    // -- decide -------------------------------------------------------------

    #[test]
    fn hysteresis_holds_until_stop_threshold() {
        let p = policy_30_80();
        let s = decide(&p, pct(25.0), pct(60.0), IrrigationState::IDLE);
        assert_eq!(s, IrrigationState::FIELD1);

        let s = decide(&p, pct(75.0), pct(60.0), s);
        assert_eq!(s, IrrigationState::FIELD1, "stopped inside the band");

        let s = decide(&p, pct(81.0), pct(60.0), s);
        assert_eq!(s, IrrigationState::IDLE);
    }

    #[test]
    fn inactive_field_inside_band_does_not_start() {
        let s = decide(&policy_30_80(), pct(50.0), pct(50.0), IrrigationState::IDLE);
        assert_eq!(s, IrrigationState::IDLE);
    }

    #[test]
    fn field1_preempts_running_field2() {
        let s = decide(&policy_30_80(), pct(20.0), pct(10.0), IrrigationState::FIELD2);
        assert_eq!(s, IrrigationState::FIELD1);
    }

    #[test]
    fn dry_field2_preempts_field1_mid_cycle() {
        let s = decide(&policy_30_80(), pct(50.0), pct(10.0), IrrigationState::FIELD1);
        assert_eq!(s, IrrigationState::FIELD2);
    }

    #[test]
    fn field1_holds_band_when_field2_inside_band() {
        let s = decide(&policy_30_80(), pct(50.0), pct(50.0), IrrigationState::FIELD1);
        assert_eq!(s, IrrigationState::FIELD1);
    }

    #[test]
    fn field2_starts_when_field1_finishes() {
        let s = decide(&policy_30_80(), pct(85.0), pct(10.0), IrrigationState::FIELD1);
        assert_eq!(s, IrrigationState::FIELD2);
    }

    #[test]
    fn field2_runs_through_band_then_stops() {
        let p = policy_30_80();
        let s = decide(&p, pct(50.0), pct(20.0), IrrigationState::IDLE);
        assert_eq!(s, IrrigationState::FIELD2);
        let s = decide(&p, pct(50.0), pct(70.0), s);
        assert_eq!(s, IrrigationState::FIELD2);
        let s = decide(&p, pct(50.0), pct(80.0), s);
        assert_eq!(s, IrrigationState::IDLE);
    }

    #[test]
    fn boolean_field2_digital_variant() {
        let p = Config::digital().policy();
        let s = decide(&p, pct(60.0), Reading::Dry(true), IrrigationState::IDLE);
        assert_eq!(s, IrrigationState::FIELD2);
        let s = decide(&p, pct(60.0), Reading::Dry(false), s);
        assert_eq!(s, IrrigationState::IDLE);
    }

    #[test]
    fn idle_clear_is_idempotent() {
        let stray = IrrigationState {
            pump_on: true,
            servo: ServoPosition::State2,
            field1_active: false,
            field2_active: false,
        };
        let s = decide(&policy_30_80(), pct(50.0), pct(50.0), stray);
        assert_eq!(s, IrrigationState::IDLE);
    }
}
