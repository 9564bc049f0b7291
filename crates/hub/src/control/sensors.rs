//! Sensor intake: validate a report, store it, refresh liveness, then run the
//! fire policy and (when AUTO is in charge) the irrigation policy, all in one
//! call under the write guard.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::irrigation::{self, IrrigationState};
use super::{DeviceState, EventKind, RequestedMode};
use crate::config::SensorKind;
use crate::error::{ControlError, Result};

/// Upper bound for percentage readings; larger values are clamped.
const PERCENT_MAX: f64 = 100.0;

/// One field's moisture value as the device sends it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    /// Soil moisture percentage.
    Percent(f64),
    /// Digital probe: `true` means dry.
    Dry(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReport {
    pub field1: Reading,
    pub field2: Reading,
    /// Absent on devices without a fire sensor; treated as "no fire".
    pub fire_detected: Option<bool>,
}

/// Check a reading against the field's configured sensor kind.
fn validate(field: &str, kind: &SensorKind, reading: Reading) -> Result<Reading> {
    match (kind, reading) {
        (SensorKind::Continuous { .. }, Reading::Percent(v)) => {
            if !v.is_finite() {
                return Err(ControlError::InvalidInput(format!(
                    "{field} is not a finite number"
                )));
            }
            if v < 0.0 {
                return Err(ControlError::InvalidInput(format!(
                    "{field} must be non-negative, got {v}"
                )));
            }
            Ok(Reading::Percent(v.min(PERCENT_MAX)))
        }
        (SensorKind::Boolean, Reading::Dry(_)) => Ok(reading),
        (SensorKind::Continuous { .. }, Reading::Dry(_)) => Err(ControlError::InvalidInput(
            format!("{field} expects a moisture percentage"),
        )),
        (SensorKind::Boolean, Reading::Percent(_)) => Err(ControlError::InvalidInput(format!(
            "{field} expects a dry/wet boolean"
        ))),
    }
}

impl DeviceState {
    /// Process one inbound sensor report. Nothing is written unless both
    /// readings validate.
    pub fn report_sensors(&mut self, report: SensorReport, now: OffsetDateTime) -> Result<()> {
        let field1 = validate("sensor1", &self.policy.field1, report.field1)?;
        let field2 = validate("sensor2", &self.policy.field2, report.field2)?;

        self.field1_reading = Some(field1);
        self.field2_reading = Some(field2);
        self.fire_detected = report.fire_detected.unwrap_or(false);
        self.liveness.touch(now);

        debug!(?field1, ?field2, fire = self.fire_detected, "sensor report");

        let fire_active = self.policy.fire_enabled && self.apply_fire_policy();

        if !fire_active && self.requested == RequestedMode::Auto {
            self.apply_irrigation(field1, field2);
        }
        Ok(())
    }

    fn apply_irrigation(&mut self, field1: Reading, field2: Reading) {
        let current = IrrigationState {
            pump_on: self.pump_on,
            servo: self.servo,
            field1_active: self.field1_active,
            field2_active: self.field2_active,
        };
        let next = irrigation::decide(&self.policy, field1, field2, current);

        self.pump_on = next.pump_on;
        self.servo = next.servo;
        self.field1_active = next.field1_active;
        self.field2_active = next.field2_active;

        for (zone, was, now) in [
            (1, current.field1_active, next.field1_active),
            (2, current.field2_active, next.field2_active),
        ] {
            if was != now {
                let verb = if now { "started" } else { "stopped" };
                info!(zone, "auto irrigation {verb}");
                self.push_event(
                    EventKind::Irrigation,
                    format!("field {zone} irrigation {verb}"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::control::tests::{assert_invariants, state_with, test_state, T0};
    use crate::control::{FireSubmode, Mode, ServoPosition};
    use proptest::prelude::*;

    fn report(f1: f64, f2: f64) -> SensorReport {
        SensorReport {
            field1: Reading::Percent(f1),
            field2: Reading::Percent(f2),
            fire_detected: Some(false),
        }
    }

    fn auto(config: Config) -> DeviceState {
        let mut st = state_with(config);
        st.release_manual();
        st.request_auto().unwrap();
        st
    }

    // -- validation -----------------------------------------------------------

    #[test]
    fn negative_reading_rejected_without_mutation() {
        let mut st = auto(Config::fire_guard());
        let err = st.report_sensors(report(-1.0, 50.0), T0).unwrap_err();
        assert!(matches!(err, ControlError::InvalidInput(_)));
        assert!(st.field1_reading.is_none());
        assert!(st.liveness.last_contact_at().is_none(), "contact recorded");
        assert!(!st.pump_on);
    }

    #[test]
    fn nan_reading_rejected() {
        let mut st = test_state();
        assert!(st.report_sensors(report(20.0, f64::NAN), T0).is_err());
    }

    #[test]
    fn reading_above_hundred_is_clamped() {
        let mut st = test_state();
        st.report_sensors(report(140.0, 50.0), T0).unwrap();
        assert_eq!(st.field1_reading, Some(Reading::Percent(100.0)));
    }

    #[test]
    fn kind_mismatch_rejected() {
        let mut st = state_with(Config::digital());
        let err = st.report_sensors(report(60.0, 20.0), T0).unwrap_err();
        assert!(matches!(err, ControlError::InvalidInput(ref m) if m.contains("sensor2")));
    }

    #[test]
    fn reading_deserializes_number_or_bool() {
        assert_eq!(
            serde_json::from_str::<Reading>("42").unwrap(),
            Reading::Percent(42.0)
        );
        assert_eq!(
            serde_json::from_str::<Reading>("true").unwrap(),
            Reading::Dry(true)
        );
        assert!(serde_json::from_str::<Reading>("\"wet\"").is_err());
    }

    // -- liveness ---------------------------------------------------------------

    #[test]
    fn report_refreshes_liveness() {
        let mut st = test_state();
        st.report_sensors(report(50.0, 50.0), T0).unwrap();
        assert!(st.is_reachable(T0 + time::Duration::seconds(10)));
        assert!(!st.is_reachable(T0 + time::Duration::seconds(16)));
    }

    // -- irrigation -------------------------------------------------------------

    #[test]
    fn manual_mode_ignores_irrigation_policy() {
        let mut st = test_state();
        st.report_sensors(report(5.0, 5.0), T0).unwrap();
        assert!(!st.pump_on);
        assert!(!st.field1_active);
    }

    #[test]
    fn field1_preempts_dry_field2() {
        let mut st = auto(Config::digital());
        st.report_sensors(
            SensorReport {
                field1: Reading::Percent(20.0),
                field2: Reading::Dry(true),
                fire_detected: None,
            },
            T0,
        )
        .unwrap();
        assert!(st.pump_on);
        assert_eq!(st.servo, ServoPosition::State1);
        assert!(st.field1_active);
        assert!(!st.field2_active);
    }

    #[test]
    fn hysteresis_through_reports() {
        let mut st = auto(Config::fire_guard());
        st.report_sensors(report(25.0, 50.0), T0).unwrap();
        assert!(st.pump_on && st.field1_active);
        st.report_sensors(report(75.0, 50.0), T0).unwrap();
        assert!(st.pump_on && st.field1_active, "stopped before 80");
        st.report_sensors(report(81.0, 50.0), T0).unwrap();
        assert!(!st.pump_on && !st.field1_active);
        assert_eq!(st.servo, ServoPosition::Idle);
    }

    #[test]
    fn dry_field2_takes_over_from_field1_in_band() {
        let mut st = auto(Config::fire_guard());
        st.report_sensors(report(25.0, 50.0), T0).unwrap();
        assert!(st.field1_active);
        st.report_sensors(report(50.0, 10.0), T0).unwrap();
        assert!(st.pump_on);
        assert!(!st.field1_active && st.field2_active);
        assert_eq!(st.servo, ServoPosition::State2);
        assert_invariants(&st);
    }

    #[test]
    fn irrigation_records_start_and_stop_events() {
        let mut st = auto(Config::fire_guard());
        st.report_sensors(report(25.0, 50.0), T0).unwrap();
        st.report_sensors(report(90.0, 50.0), T0).unwrap();
        let details: Vec<_> = st
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Irrigation)
            .map(|e| e.detail.as_str())
            .collect();
        assert_eq!(
            details,
            ["field 1 irrigation started", "field 1 irrigation stopped"]
        );
    }

    // -- fire -------------------------------------------------------------------

    #[test]
    fn fire_auto_follows_sensor() {
        let mut st = auto(Config::fire_guard());
        st.set_fire_submode(FireSubmode::Auto).unwrap();

        st.report_sensors(
            SensorReport {
                fire_detected: Some(true),
                ..report(10.0, 50.0)
            },
            T0,
        )
        .unwrap();
        assert_eq!(st.mode(), Mode::FireEmergency);
        assert!(!st.field1_active, "irrigation ran during fire");
        assert_eq!(st.servo, ServoPosition::State2);
        assert_invariants(&st);

        st.report_sensors(report(10.0, 50.0), T0).unwrap();
        assert_eq!(st.mode(), Mode::Auto);
        assert_eq!(st.fire_submode, FireSubmode::Off);
        assert!(!st.fire_relay_on);
        // Same report falls through to irrigation once fire clears.
        assert!(st.field1_active);
        assert_eq!(st.servo, ServoPosition::State1);
    }

    #[test]
    fn fire_manual_reactivates_on_every_report() {
        let mut st = test_state();
        st.set_fire_submode(FireSubmode::Manual).unwrap();
        st.manual_pump(false).unwrap();
        st.report_sensors(report(50.0, 50.0), T0).unwrap();
        assert!(st.pump_on);
        assert_eq!(st.mode(), Mode::FireEmergency);
    }

    #[test]
    fn fire_off_ignores_detection() {
        let mut st = test_state();
        st.report_sensors(
            SensorReport {
                fire_detected: Some(true),
                ..report(50.0, 50.0)
            },
            T0,
        )
        .unwrap();
        assert_eq!(st.mode(), Mode::Manual);
        assert!(st.fire_detected);
    }

    #[test]
    fn fire_disabled_never_activates() {
        let mut st = auto(Config::classic());
        st.report_sensors(
            SensorReport {
                fire_detected: Some(true),
                ..report(10.0, 50.0)
            },
            T0,
        )
        .unwrap();
        assert_eq!(st.mode(), Mode::Auto);
        assert!(st.field1_active);
    }

    #[test]
    fn missing_fire_flag_reads_as_clear() {
        let mut st = test_state();
        st.fire_detected = true;
        st.report_sensors(
            SensorReport {
                fire_detected: None,
                ..report(50.0, 50.0)
            },
            T0,
        )
        .unwrap();
        assert!(!st.fire_detected);
    }

    // -- invariants under arbitrary report sequences ----------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Report(f64, f64, bool),
        FireMode(FireSubmode),
        ReleaseAuto,
        RequestAuto,
        ReleaseManual,
        RequestManual,
        Alarm(bool),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0.0..120.0f64, 0.0..120.0f64, any::<bool>())
                .prop_map(|(a, b, f)| Op::Report(a, b, f)),
            1 => prop_oneof![
                Just(FireSubmode::Off),
                Just(FireSubmode::Auto),
                Just(FireSubmode::Manual)
            ]
            .prop_map(Op::FireMode),
            1 => Just(Op::ReleaseAuto),
            1 => Just(Op::RequestAuto),
            1 => Just(Op::ReleaseManual),
            1 => Just(Op::RequestManual),
            1 => any::<bool>().prop_map(Op::Alarm),
        ]
    }

    proptest! {
        /// No sequence of operations ever runs both zones, irrigates during a
        /// fire emergency, or lets the buzzer drift from relay/alarm.
        #[test]
        fn invariants_hold_for_any_sequence(
            ops in proptest::collection::vec(arb_op(), 1..60),
        ) {
            let mut st = auto(Config::fire_guard());
            for op in ops {
                match op {
                    Op::Report(a, b, f) => {
                        let _ = st.report_sensors(
                            SensorReport { fire_detected: Some(f), ..report(a, b) },
                            T0,
                        );
                    }
                    Op::FireMode(m) => { let _ = st.set_fire_submode(m); }
                    Op::ReleaseAuto => st.release_auto(),
                    Op::RequestAuto => { let _ = st.request_auto(); }
                    Op::ReleaseManual => st.release_manual(),
                    Op::RequestManual => { let _ = st.request_manual(); }
                    Op::Alarm(on) => {
                        let _ = if on { st.alarm_on() } else { st.alarm_off() };
                    }
                }
                prop_assert!(!(st.field1_active && st.field2_active));
                if st.mode() == Mode::FireEmergency {
                    prop_assert!(!st.field1_active && !st.field2_active);
                }
                prop_assert_eq!(st.buzzer_on(), st.fire_relay_on || st.manual_alarm_latched);
                if st.fire_detected {
                    prop_assert!(st.fire_submode != FireSubmode::Auto || st.fire_active);
                }
            }
        }
    }
}
