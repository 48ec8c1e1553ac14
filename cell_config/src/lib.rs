#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the measurement daemon.
//!
//! Every section is optional and falls back to the defaults of the deployed
//! cell; `Config::validate` rejects values the engine cannot run with.
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Sampling {
    /// Minimum samples per window before an average is reported (N_SAMPLE).
    pub n_sample: usize,
    pub sensor_period_ms: u64,
    /// Cadence of the CO₂ compensation loop.
    pub calibration_period_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            n_sample: 10,
            sensor_period_ms: 1000,
            calibration_period_ms: 5000,
        }
    }
}

/// How many sensors feed each quantity; window capacity is `n_sample * replicas`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Replicas {
    pub temperature: usize,
    pub humidity: usize,
    pub pressure: usize,
    pub co2: usize,
    pub o2: usize,
    pub luminosity: usize,
}

impl Default for Replicas {
    fn default() -> Self {
        Self {
            temperature: 2,
            humidity: 1,
            pressure: 2,
            co2: 1,
            o2: 1,
            luminosity: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Probe {
    pub vendor_id: u16,
    pub product_id: u16,
    pub response_timeout_ms: u64,
    /// Length of one inbound listen slice in the dispatch loop.
    pub poll_ms: u64,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            vendor_id: 0x00FF,
            product_id: 0x00FF,
            response_timeout_ms: 3000,
            poll_ms: 100,
        }
    }
}

/// Oxygen probe calibration and site constants.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Calibration {
    /// Site altitude in metres.
    pub altitude: i32,
    pub f1: f64,
    pub m: f64,
    pub dphi1: f64,
    pub dphi2: f64,
    pub dksv1: f64,
    pub dksv2: f64,
    /// Reference pressure in hPa.
    pub pressure: f64,
    pub cal0: f64,
    pub cal2nd: f64,
    pub t0: f64,
    pub t2nd: f64,
    pub o2_cal2nd: f64,
    pub calib_is_humid: bool,
    pub enable_temp_fibox: bool,
    pub humid_mode: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            altitude: 237,
            f1: 0.808,
            m: 30.0,
            dphi1: -0.068,
            dphi2: -0.00035,
            dksv1: 0.000371,
            dksv2: 0.0,
            pressure: 967.0,
            cal0: 60.22,
            cal2nd: 26.82,
            t0: 20.0,
            t2nd: 20.0,
            o2_cal2nd: 100.0,
            calib_is_humid: true,
            enable_temp_fibox: false,
            humid_mode: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Server {
    pub bind: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:12778".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Hardware {
    /// I²C bus number shared by the on-board sensors.
    pub i2c_bus: u8,
}

impl Default for Hardware {
    fn default() -> Self {
        Self { i2c_bus: 1 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub sampling: Sampling,
    pub replicas: Replicas,
    pub probe: Probe,
    pub calibration: Calibration,
    pub server: Server,
    pub hardware: Hardware,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sampling
        if self.sampling.n_sample < 3 {
            eyre::bail!("sampling.n_sample must be >= 3");
        }
        if self.sampling.sensor_period_ms == 0 {
            eyre::bail!("sampling.sensor_period_ms must be > 0");
        }
        if self.sampling.calibration_period_ms == 0 {
            eyre::bail!("sampling.calibration_period_ms must be > 0");
        }

        // Replicas
        let r = &self.replicas;
        for (name, v) in [
            ("temperature", r.temperature),
            ("humidity", r.humidity),
            ("pressure", r.pressure),
            ("co2", r.co2),
            ("o2", r.o2),
            ("luminosity", r.luminosity),
        ] {
            if v == 0 {
                eyre::bail!("replicas.{name} must be >= 1");
            }
        }

        // Probe
        if self.probe.response_timeout_ms == 0 {
            eyre::bail!("probe.response_timeout_ms must be > 0");
        }
        if self.probe.poll_ms == 0 {
            eyre::bail!("probe.poll_ms must be > 0");
        }

        // Calibration
        let c = &self.calibration;
        for (name, v) in [
            ("f1", c.f1),
            ("m", c.m),
            ("dphi1", c.dphi1),
            ("dphi2", c.dphi2),
            ("dksv1", c.dksv1),
            ("dksv2", c.dksv2),
            ("pressure", c.pressure),
            ("cal0", c.cal0),
            ("cal2nd", c.cal2nd),
            ("t0", c.t0),
            ("t2nd", c.t2nd),
            ("o2_cal2nd", c.o2_cal2nd),
        ] {
            if !v.is_finite() {
                eyre::bail!("calibration.{name} must be finite");
            }
        }
        if c.m == 0.0 {
            eyre::bail!("calibration.m must be non-zero");
        }
        if c.pressure <= 0.0 {
            eyre::bail!("calibration.pressure must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
