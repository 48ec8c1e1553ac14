//! Oxygen calibration constants and the barometric sea-level correction.

/// Standard gravity, m/s².
pub const GRAVITY: f64 = 9.80665;
/// Specific gas constant of dry air, J/(kg·K).
pub const R_DRY_AIR: f64 = 287.058;

/// Runtime calibration set. Replaced wholesale by `MeasureModule::set_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Site altitude in metres.
    pub altitude: f64,
    pub f1: f64,
    pub m: f64,
    pub dphi1: f64,
    pub dphi2: f64,
    pub dksv1: f64,
    pub dksv2: f64,
    /// Reference pressure, hPa.
    pub pressure: f64,
    /// Phase angle of the zero-oxygen point at `t0`, degrees.
    pub cal0: f64,
    /// Phase angle of the second calibration point at `t2nd`, degrees.
    pub cal2nd: f64,
    pub t0: f64,
    pub t2nd: f64,
    /// Oxygen reference value at the second calibration point.
    pub o2_cal2nd: f64,
    pub calib_is_humid: bool,
    pub humid_mode: bool,
    /// When false, the probe's "temperature sensor absent" flag is ignored.
    pub enable_temp_fibox: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::from(&cell_config::Calibration::default())
    }
}

/// `P · exp(g·h / (R·T))` with `T` in kelvin. Units of `pressure` are preserved.
pub fn pressure_at_sea_level(temperature_c: f64, pressure: f64, altitude_m: f64) -> f64 {
    let t_k = temperature_c + 273.15;
    pressure * ((GRAVITY * altitude_m) / (R_DRY_AIR * t_k)).exp()
}
