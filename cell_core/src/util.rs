//! Unit conversions for CO₂ sensor compensation writes.
//!
//! Float to integer casts saturate, so out-of-range readings clamp to the
//! ends of the tick range instead of wrapping.

/// Relative humidity in % to sensor ticks (`RH · 65535 / 100`).
#[inline]
pub fn humidity_ticks(rh_percent: f64) -> u16 {
    (rh_percent * 65535.0 / 100.0) as u16
}

/// Pressure in Pa to whole mbar.
#[inline]
pub fn pressure_mbar(pa: f64) -> u16 {
    (pa / 100.0) as u16
}

/// Temperature in °C to signed sensor ticks (`T · 200`).
#[inline]
pub fn temperature_ticks(celsius: f64) -> i16 {
    (celsius * 200.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0)]
    #[case(50.0, 32767)]
    #[case(100.0, 65535)]
    #[case(120.0, 65535)]
    #[case(-5.0, 0)]
    fn humidity(#[case] rh: f64, #[case] ticks: u16) {
        assert_eq!(humidity_ticks(rh), ticks);
    }

    #[test]
    fn pressure_and_temperature() {
        assert_eq!(pressure_mbar(101_325.0), 1013);
        assert_eq!(temperature_ticks(21.0), 4200);
        assert_eq!(temperature_ticks(f64::NAN), 0);
    }

    #[rstest]
    #[case(-1.0, -200)]
    #[case(-10.0, -2000)]
    #[case(-200.0, i16::MIN)]
    #[case(200.0, i16::MAX)]
    fn temperature_below_freezing_and_clamped(#[case] celsius: f64, #[case] ticks: i16) {
        assert_eq!(temperature_ticks(celsius), ticks);
    }
}
