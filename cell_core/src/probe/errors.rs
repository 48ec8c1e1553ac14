//! Probe status bitmask decoding.

use std::fmt;

/// Bit 0: the probe's own temperature sensor is absent.
pub const TEMPERATURE_SENSOR_ABSENT: u32 = 1;

const MESSAGES: [&str; 17] = [
    "probe temperature sensor (PT100) is not connected",
    "oxygen sensor not detected, check the optical fibre and the sensor spot",
    "oxygen signal amplitude too low, the fibre may be too far from the sensor spot",
    "SD card failure",
    "reference amplitude out of range",
    "photodiode saturated, the sensor may be overexposed to light",
    "ADC overflow (reference)",
    "ADC overflow (signal)",
    "ADC overflow (signal)",
    "PME error",
    "probe pressure sensor not detected",
    "temperature too high",
    "SD card full",
    "pulse counter overflow",
    "temperature sensor unavailable",
    "pressure sensor unavailable",
    "date/time not set",
];

/// One asserted bit of the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFlag {
    pub code: u32,
    pub message: &'static str,
}

impl fmt::Display for SensorFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

fn message_for_bit(bit: u32) -> &'static str {
    MESSAGES.get(bit as usize).copied().unwrap_or("unknown error")
}

/// Decode every asserted bit, lowest first.
pub fn decode(bits: u32) -> Vec<SensorFlag> {
    (0..32)
        .filter(|b| bits & (1 << b) != 0)
        .map(|b| SensorFlag {
            code: 1 << b,
            message: message_for_bit(b),
        })
        .collect()
}

pub fn join(flags: &[SensorFlag]) -> String {
    flags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
