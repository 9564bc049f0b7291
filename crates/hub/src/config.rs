//! TOML config loading and validation for the controller: liveness timing,
//! web port, fire subsystem, and the per-field sensor policy.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Moisture readings are percentages.
const PERCENT_MAX: f64 = 100.0;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub liveness_timeout_sec: u64,
    pub watchdog_interval_sec: u64,
    pub web_port: u16,
    pub fire: FireConfig,
    pub field1: SensorKind,
    pub field2: SensorKind,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FireConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// How a field's moisture sensor reports and when it starts / stops watering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SensorKind {
    /// Percentage probe. Irrigation starts below `start_below` and stops at
    /// or above `stop_at`; the gap between them is the hysteresis band.
    Continuous { start_below: f64, stop_at: f64 },
    /// Digital dry/wet probe; no band, the flag flips exactly.
    Boolean,
}

/// The slice of config the control core works from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub field1: SensorKind,
    pub field2: SensorKind,
    pub fire_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::fire_guard()
    }
}

// ---------------------------------------------------------------------------
// Presets (the device variants seen in the field)
// ---------------------------------------------------------------------------

impl Config {
    /// Two percentage probes at 30/70, no fire hardware.
    pub fn classic() -> Self {
        Self {
            fire: FireConfig { enabled: false },
            field1: SensorKind::Continuous {
                start_below: 30.0,
                stop_at: 70.0,
            },
            field2: SensorKind::Continuous {
                start_below: 30.0,
                stop_at: 70.0,
            },
            ..Self::fire_guard()
        }
    }

    /// Two percentage probes at 30/80 with the fire relay and buzzer.
    pub fn fire_guard() -> Self {
        Self {
            liveness_timeout_sec: 15,
            watchdog_interval_sec: 5,
            web_port: 8080,
            fire: FireConfig { enabled: true },
            field1: SensorKind::Continuous {
                start_below: 30.0,
                stop_at: 80.0,
            },
            field2: SensorKind::Continuous {
                start_below: 30.0,
                stop_at: 80.0,
            },
        }
    }

    /// Field 1 waters below 50 with no band, field 2 is a digital probe.
    pub fn digital() -> Self {
        Self {
            field1: SensorKind::Continuous {
                start_below: 50.0,
                stop_at: 50.0,
            },
            field2: SensorKind::Boolean,
            ..Self::fire_guard()
        }
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::classic()),
            "fire-guard" | "fire_guard" => Ok(Self::fire_guard()),
            "digital" => Ok(Self::digital()),
            other => bail!("unknown preset '{other}' (expected classic, fire-guard or digital)"),
        }
    }

    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            field1: self.field1,
            field2: self.field2,
            fire_enabled: self.fire.enabled,
        }
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_sec)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_sec)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate the whole config. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.liveness_timeout_sec == 0 {
            errors.push("liveness_timeout_sec must be positive".to_string());
        }
        if self.watchdog_interval_sec == 0 {
            errors.push("watchdog_interval_sec must be positive".to_string());
        }
        if self.web_port == 0 {
            errors.push("web_port must be non-zero".to_string());
        }

        validate_sensor("field1", &self.field1, &mut errors);
        validate_sensor("field2", &self.field2, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

fn validate_sensor(name: &str, kind: &SensorKind, errors: &mut Vec<String>) {
    let SensorKind::Continuous {
        start_below,
        stop_at,
    } = *kind
    else {
        return;
    };

    for (label, v) in [("start_below", start_below), ("stop_at", stop_at)] {
        if !v.is_finite() || !(0.0..=PERCENT_MAX).contains(&v) {
            errors.push(format!(
                "{name}: {label} {v} out of range [0, {PERCENT_MAX}]"
            ));
        }
    }

    if stop_at < start_below {
        errors.push(format!(
            "{name}: stop_at ({stop_at}) must not be below start_below ({start_below})"
        ));
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Resolve config from the environment: `CONFIG_PATH` wins, otherwise the
/// preset named by `CONTROL_PRESET`. `WEB_PORT` overrides the port either way.
pub fn from_env() -> Result<Config> {
    let mut config = match std::env::var("CONFIG_PATH") {
        Ok(path) => load(&path)?,
        Err(_) => {
            let name = std::env::var("CONTROL_PRESET").unwrap_or_else(|_| "fire-guard".to_string());
            Config::preset(&name)?
        }
    };

    if let Ok(port) = std::env::var("WEB_PORT") {
        config.web_port = port
            .parse()
            .with_context(|| format!("invalid WEB_PORT: {port}"))?;
    }

    config.validate().context("invalid config")?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
