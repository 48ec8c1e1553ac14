//! SHTC3 temperature/humidity sensor.

use std::thread;
use std::time::Duration;

use cell_traits::{BoxError, Quantity, ReadError, Sample, Sensor};

use crate::bus::SensirionBus;
use crate::error::HwError;

const ADDRESS: u16 = 0x70;

const CMD_WAKE_UP: u16 = 0x3517;
const CMD_SLEEP: u16 = 0xB098;
const CMD_READ_ID: u16 = 0xEFC8;
// normal power, temperature first, no clock stretching
const CMD_MEASURE: u16 = 0x7866;

const WAKE_WAIT: Duration = Duration::from_micros(240);
const MEASURE_WAIT: Duration = Duration::from_micros(14_400);

pub struct Shtc3 {
    bus_number: u8,
    bus: Option<SensirionBus>,
}

impl Shtc3 {
    pub fn new(bus_number: u8) -> Self {
        Self {
            bus_number,
            bus: None,
        }
    }

    fn bus(&mut self) -> Result<&mut SensirionBus, HwError> {
        self.bus
            .as_mut()
            .ok_or_else(|| HwError::I2c("shtc3 not initialised".into()))
    }

    fn measure(&mut self) -> Result<(u16, u16), HwError> {
        let bus = self.bus()?;
        bus.write_command(CMD_WAKE_UP, &[])?;
        thread::sleep(WAKE_WAIT);
        let words = bus.command_then_read(CMD_MEASURE, MEASURE_WAIT, 2)?;
        bus.write_command(CMD_SLEEP, &[])?;
        Ok((words[0], words[1]))
    }
}

pub fn temperature_c(raw: u16) -> f64 {
    175.0 * f64::from(raw) / 65536.0 - 45.0
}

pub fn humidity_percent(raw: u16) -> f64 {
    100.0 * f64::from(raw) / 65536.0
}

impl Sensor for Shtc3 {
    fn name(&self) -> &'static str {
        "climate"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.bus = None;
        self.bus = Some(SensirionBus::open(self.bus_number, ADDRESS)?);
        Ok(())
    }

    /// Wakes the sensor and reads its id register; a CRC-valid answer means it is there.
    fn self_test(&mut self) -> Result<(), BoxError> {
        let bus = self.bus()?;
        bus.write_command(CMD_WAKE_UP, &[])?;
        thread::sleep(WAKE_WAIT);
        let id = bus.command_then_read(CMD_READ_ID, WAKE_WAIT, 1)?;
        tracing::debug!(id = id[0], "shtc3 present");
        bus.write_command(CMD_SLEEP, &[])?;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let (t, rh) = self.measure().map_err(|e| ReadError::Fault(Box::new(e)))?;
        Ok(vec![
            Sample::new(Quantity::Temperature, temperature_c(t)),
            Sample::new(Quantity::Humidity, humidity_percent(rh)),
        ])
    }

    fn close(&mut self) {
        self.bus = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_hit_range_ends() {
        assert_eq!(temperature_c(0), -45.0);
        assert_eq!(humidity_percent(0), 0.0);
        assert!((humidity_percent(u16::MAX) - 100.0).abs() < 0.01);
    }
}
