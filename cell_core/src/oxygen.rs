//! Two-point Stern-Volmer oxygen calculation.
//!
//! The probe reports the phase shift of its luminophore; with two calibration
//! points (zero oxygen at `cal0`, reference oxygen at `cal2nd`) the quenching
//! constant is solved once per call and the live phase is inverted through the
//! same quadratic.

use std::f64::consts::PI;

use crate::calibration::CalibrationConfig;
use crate::error::CellError;

/// Volume fraction of O₂ in dry air.
pub const DRY_AIR_O2_FRACTION: f64 = 0.2095;

fn tan_deg(x: f64) -> f64 {
    (x * PI / 180.0).tan()
}

/// Water vapour saturation pressure in hPa for a temperature in kelvin.
pub fn water_vapour_pressure(t_k: f64) -> f64 {
    (52.57 - 6690.9 / t_k - 4.681 * t_k.ln()).exp()
}

/// Live inputs for one oxygen computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OxygenInput {
    /// Phase angle, degrees.
    pub phase: f64,
    pub temperature_c: f64,
    /// Live pressure, Pa.
    pub pressure_pa: f64,
}

pub struct OxygenCalculation<'a> {
    cfg: &'a CalibrationConfig,
}

impl<'a> OxygenCalculation<'a> {
    pub fn new(cfg: &'a CalibrationConfig) -> Self {
        Self { cfg }
    }

    fn tan_phi0(&self, t: f64) -> f64 {
        let c = self.cfg;
        tan_deg(c.cal0 + c.dphi1 * (t - c.t0) + c.dphi2 * (t.powi(2) - c.t0.powi(2)))
    }

    /// Ratio of the calibration phase to the zero-oxygen phase at `t2nd`.
    pub fn calibration_ratio(&self) -> f64 {
        tan_deg(self.cfg.cal2nd) / self.tan_phi0(self.cfg.t2nd)
    }

    /// Quenching constant at the calibration temperature.
    pub fn ksv(&self) -> f64 {
        let c = self.cfg;
        let r = self.calibration_ratio();
        let u = c.o2_cal2nd;
        let b = r * u + r * u / c.m - c.f1 * u / c.m - u + c.f1 * u;
        let num1 = (r / c.m) * u * u;
        let num2 = r - 1.0;
        (-b + (b * b - 4.0 * num1 * num2).sqrt()) / (2.0 * num1)
    }

    fn ksv_at(&self, t: f64) -> f64 {
        let c = self.cfg;
        self.ksv() - c.dksv1 * (c.t2nd - t) + c.dksv2 * (c.t2nd.powi(2) - t.powi(2))
    }

    /// Uncorrected oxygen value for `phase` at temperature `t`.
    fn raw(&self, phase: f64, t: f64) -> f64 {
        let c = self.cfg;
        let k = self.ksv_at(t);
        let q = tan_deg(phase) / self.tan_phi0(t);
        let a = (q / c.m) * k * k;
        let b = q * k + q * k / c.m - c.f1 * k / c.m - k + c.f1 * k;
        let cc = q - 1.0;
        (-b + (b * b - 4.0 * a * cc).sqrt()) / (2.0 * a)
    }

    /// Final oxygen value (% of air saturation scaled to the dry-air fraction).
    pub fn compute(&self, input: OxygenInput) -> Result<f64, CellError> {
        let c = self.cfg;
        let t = input.temperature_c;
        let live_hpa = input.pressure_pa / 100.0;
        let reference = c.pressure;
        let pw = water_vapour_pressure(t + 273.15);

        let raw = self.raw(input.phase, t);
        let corrected = match (c.calib_is_humid, c.humid_mode) {
            (false, false) | (true, true) => raw * (reference / live_hpa),
            (false, true) => raw * reference / (reference - pw) * (reference / live_hpa),
            (true, false) => raw * ((reference - pw) / reference) * (reference / live_hpa),
        };

        let mut o2 = corrected * DRY_AIR_O2_FRACTION;
        if c.humid_mode {
            o2 *= (live_hpa - pw) / live_hpa;
        }

        if !o2.is_finite() {
            tracing::debug!(?input, raw, "non-finite oxygen result");
            return Err(CellError::CalculationError);
        }
        Ok(o2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry_cfg() -> CalibrationConfig {
        CalibrationConfig {
            calib_is_humid: false,
            humid_mode: false,
            ..CalibrationConfig::default()
        }
    }

    fn at_calibration_point(cfg: &CalibrationConfig) -> OxygenInput {
        OxygenInput {
            phase: cfg.cal2nd,
            temperature_c: cfg.t2nd,
            pressure_pa: cfg.pressure * 100.0,
        }
    }

    #[test]
    fn round_trip_reproduces_reference_value() {
        let cfg = dry_cfg();
        let o2 = OxygenCalculation::new(&cfg)
            .compute(at_calibration_point(&cfg))
            .unwrap();
        assert!((o2 - cfg.o2_cal2nd * DRY_AIR_O2_FRACTION).abs() < 1e-9, "{o2}");
    }

    #[test]
    fn zero_oxygen_phase_reads_zero() {
        let cfg = dry_cfg();
        let input = OxygenInput {
            phase: cfg.cal0,
            ..at_calibration_point(&cfg)
        };
        let o2 = OxygenCalculation::new(&cfg).compute(input).unwrap();
        assert!(o2.abs() < 1e-9, "{o2}");
    }

    #[test]
    fn degenerate_ratio_is_a_calculation_error() {
        // cal2nd equal to the zero-oxygen angle makes r = 1 and ksv = 0.
        let mut cfg = dry_cfg();
        cfg.cal2nd = cfg.cal0;
        let calc = OxygenCalculation::new(&cfg);
        assert!((calc.calibration_ratio() - 1.0).abs() < 1e-12);
        assert_eq!(calc.ksv(), 0.0);
        assert_eq!(
            calc.compute(at_calibration_point(&cfg)),
            Err(CellError::CalculationError)
        );
    }

    #[test]
    fn humid_calibration_lowers_dry_reading() {
        let dry = dry_cfg();
        let humid = CalibrationConfig {
            calib_is_humid: true,
            ..dry.clone()
        };
        let input = at_calibration_point(&dry);
        let a = OxygenCalculation::new(&dry).compute(input).unwrap();
        let b = OxygenCalculation::new(&humid).compute(input).unwrap();
        let pw = water_vapour_pressure(dry.t2nd + 273.15);
        assert!((b - a * (dry.pressure - pw) / dry.pressure).abs() < 1e-9);
    }

    #[test]
    fn humid_mode_branches_are_consistent() {
        let base = dry_cfg();
        let input = at_calibration_point(&base);
        let pw = water_vapour_pressure(base.t2nd + 273.15);
        let p = base.pressure;

        let dry_humid_mode = CalibrationConfig {
            humid_mode: true,
            ..base.clone()
        };
        let both = CalibrationConfig {
            humid_mode: true,
            calib_is_humid: true,
            ..base.clone()
        };
        let plain = OxygenCalculation::new(&base).compute(input).unwrap();
        let x = OxygenCalculation::new(&dry_humid_mode).compute(input).unwrap();
        let y = OxygenCalculation::new(&both).compute(input).unwrap();
        // (false, true): raw·P/(P−pw), then ·(P−pw)/P from humid mode
        assert!((x - plain).abs() < 1e-9);
        assert!((y - plain * (p - pw) / p).abs() < 1e-9);
    }

    #[test]
    fn lower_live_pressure_raises_reading() {
        let cfg = dry_cfg();
        let mut input = at_calibration_point(&cfg);
        let at_ref = OxygenCalculation::new(&cfg).compute(input).unwrap();
        input.pressure_pa *= 0.5;
        let at_half = OxygenCalculation::new(&cfg).compute(input).unwrap();
        assert!((at_half - 2.0 * at_ref).abs() < 1e-9);
    }

    #[test]
    fn vapour_pressure_near_twenty_degrees() {
        let pw = water_vapour_pressure(293.15);
        assert!((pw - 23.4).abs() < 0.5, "{pw}");
    }
}
