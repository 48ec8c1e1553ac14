//! STC31 thermal-conductivity CO₂ sensor.

use std::time::Duration;

use cell_traits::{BoxError, Co2Sensor, Quantity, ReadError, Sample, Sensor};

use crate::bus::SensirionBus;
use crate::error::HwError;

const ADDRESS: u16 = 0x29;

const CMD_SET_BINARY_GAS: u16 = 0x3615;
const CMD_SET_RELATIVE_HUMIDITY: u16 = 0x3624;
const CMD_SET_PRESSURE: u16 = 0x362F;
const CMD_SET_TEMPERATURE: u16 = 0x361E;
const CMD_MEASURE: u16 = 0x3639;
const CMD_SELF_TEST: u16 = 0x365B;

/// CO₂ in air, 0 to 100 vol%.
const GAS_CO2_IN_AIR_100: u16 = 0x0001;

const MEASURE_WAIT: Duration = Duration::from_millis(70);
const SELF_TEST_WAIT: Duration = Duration::from_millis(22);

pub struct Stc31 {
    bus_number: u8,
    bus: Option<SensirionBus>,
}

impl Stc31 {
    pub fn new(bus_number: u8) -> Self {
        Self {
            bus_number,
            bus: None,
        }
    }

    fn bus(&mut self) -> Result<&mut SensirionBus, HwError> {
        self.bus
            .as_mut()
            .ok_or_else(|| HwError::I2c("stc31 not initialised".into()))
    }
}

pub fn gas_percent(ticks: u16) -> f64 {
    100.0 * (f64::from(ticks) - 16384.0) / 32768.0
}

/// The temperature word is two's complement.
pub fn temperature_c(word: u16) -> f64 {
    f64::from(i16::from_be_bytes(word.to_be_bytes())) / 200.0
}

impl Sensor for Stc31 {
    fn name(&self) -> &'static str {
        "co2"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.bus = None;
        self.bus = Some(SensirionBus::open(self.bus_number, ADDRESS)?);
        Ok(())
    }

    /// Runs the on-chip self-test, then selects the gas mode.
    fn self_test(&mut self) -> Result<(), BoxError> {
        let bus = self.bus()?;
        let words = bus.command_then_read(CMD_SELF_TEST, SELF_TEST_WAIT, 1)?;
        if words[0] != 0 {
            return Err(Box::new(HwError::SelfTest {
                sensor: "stc31",
                status: words[0],
            }));
        }
        bus.write_command(CMD_SET_BINARY_GAS, &[GAS_CO2_IN_AIR_100])?;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let bus = self.bus().map_err(|e| ReadError::Fault(Box::new(e)))?;
        let words = bus
            .command_then_read(CMD_MEASURE, MEASURE_WAIT, 2)
            .map_err(|e| ReadError::Fault(Box::new(e)))?;
        Ok(vec![
            Sample::new(Quantity::Co2, gas_percent(words[0])),
            Sample::new(Quantity::Temperature, temperature_c(words[1])),
        ])
    }

    fn close(&mut self) {
        self.bus = None;
    }
}

impl Co2Sensor for Stc31 {
    fn set_relative_humidity(&mut self, ticks: u16) -> Result<(), BoxError> {
        Ok(self.bus()?.write_command(CMD_SET_RELATIVE_HUMIDITY, &[ticks])?)
    }

    fn set_pressure(&mut self, mbar: u16) -> Result<(), BoxError> {
        Ok(self.bus()?.write_command(CMD_SET_PRESSURE, &[mbar])?)
    }

    fn set_temperature(&mut self, ticks: i16) -> Result<(), BoxError> {
        let word = u16::from_be_bytes(ticks.to_be_bytes());
        Ok(self.bus()?.write_command(CMD_SET_TEMPERATURE, &[word])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversions() {
        assert_eq!(gas_percent(16384), 0.0);
        assert_eq!(gas_percent(16384 + 32768), 100.0);
        assert_eq!(temperature_c(4200), 21.0);
        assert_eq!(temperature_c(0xFF38), -1.0);
        assert_eq!(temperature_c(0x8000), -163.84);
    }
}
