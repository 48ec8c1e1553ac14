//! `From` implementations bridging `cell_config` types to `cell_core` types.

use std::time::Duration;

use cell_traits::Quantity;

use crate::calibration::CalibrationConfig;
use crate::config::{ProbeCfg, SamplingCfg};

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&cell_config::Config> for SamplingCfg {
    fn from(c: &cell_config::Config) -> Self {
        let r = &c.replicas;
        let mut replicas = [1; Quantity::COUNT];
        replicas[Quantity::Temperature.index()] = r.temperature;
        replicas[Quantity::Humidity.index()] = r.humidity;
        replicas[Quantity::Pressure.index()] = r.pressure;
        replicas[Quantity::Co2.index()] = r.co2;
        replicas[Quantity::O2.index()] = r.o2;
        replicas[Quantity::Luminosity.index()] = r.luminosity;
        Self {
            n_sample: c.sampling.n_sample,
            replicas,
            sensor_period: Duration::from_millis(c.sampling.sensor_period_ms),
            calibration_period: Duration::from_millis(c.sampling.calibration_period_ms),
        }
    }
}

// ── ProbeCfg ─────────────────────────────────────────────────────────────────

impl From<&cell_config::Probe> for ProbeCfg {
    fn from(c: &cell_config::Probe) -> Self {
        Self {
            vendor_id: c.vendor_id,
            product_id: c.product_id,
            response_timeout: Duration::from_millis(c.response_timeout_ms),
            poll: Duration::from_millis(c.poll_ms),
        }
    }
}

// ── CalibrationConfig ────────────────────────────────────────────────────────

impl From<&cell_config::Calibration> for CalibrationConfig {
    fn from(c: &cell_config::Calibration) -> Self {
        Self {
            altitude: f64::from(c.altitude),
            f1: c.f1,
            m: c.m,
            dphi1: c.dphi1,
            dphi2: c.dphi2,
            dksv1: c.dksv1,
            dksv2: c.dksv2,
            pressure: c.pressure,
            cal0: c.cal0,
            cal2nd: c.cal2nd,
            t0: c.t0,
            t2nd: c.t2nd,
            o2_cal2nd: c.o2_cal2nd,
            calib_is_humid: c.calib_is_humid,
            humid_mode: c.humid_mode,
            enable_temp_fibox: c.enable_temp_fibox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicas_land_on_their_quantity() {
        let mut cfg = cell_config::Config::default();
        cfg.replicas.luminosity = 4;
        let s = SamplingCfg::from(&cfg);
        assert_eq!(s.replicas(Quantity::Luminosity), 4);
        assert_eq!(s.replicas(Quantity::Pressure), 2);
        assert_eq!(s.calibration_period, Duration::from_secs(5));
    }

    #[test]
    fn calibration_defaults_carry_over() {
        let c = CalibrationConfig::default();
        assert_eq!(c.altitude, 237.0);
        assert_eq!(c.o2_cal2nd, 100.0);
        assert!(c.calib_is_humid);
        assert!(!c.enable_temp_fibox);
    }
}
